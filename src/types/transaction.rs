//! Transaction data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A synthetic cross-border transaction. Never mutated after generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Unique transaction identifier
    pub transaction_id: String,

    /// Transferred amount, non-negative
    pub amount: f64,

    pub source_country: String,

    /// Always different from `source_country`
    pub dest_country: String,

    /// Millisecond resolution, serialized as epoch milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Create a transaction with a fresh identifier
    pub fn new(
        amount: f64,
        source_country: impl Into<String>,
        dest_country: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id: uuid::Uuid::new_v4().to_string(),
            amount,
            source_country: source_country.into(),
            dest_country: dest_country.into(),
            timestamp,
        }
    }

    /// The (source, destination) pair used by the velocity rule
    pub fn route(&self) -> (&str, &str) {
        (&self.source_country, &self.dest_country)
    }
}

/// Projection of a transaction retained by a velocity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRecord {
    pub source_country: String,
    pub dest_country: String,
    pub timestamp: DateTime<Utc>,
}

impl RouteRecord {
    /// Directional match: Germany->Japan does not match Japan->Germany.
    pub fn same_route(&self, other: &RouteRecord) -> bool {
        self.source_country == other.source_country && self.dest_country == other.dest_country
    }
}

impl From<&Transaction> for RouteRecord {
    fn from(tx: &Transaction) -> Self {
        Self {
            source_country: tx.source_country.clone(),
            dest_country: tx.dest_country.clone(),
            timestamp: tx.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_transaction_serialization() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap();
        let tx = Transaction::new(100.0, "Germany", "Japan", ts);

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["sourceCountry"], "Germany");
        assert_eq!(json["destCountry"], "Japan");
        assert_eq!(json["timestamp"], ts.timestamp_millis());

        let deserialized: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(tx, deserialized);
    }

    #[test]
    fn test_route_match_is_directional() {
        let ts = Utc::now();
        let forward = RouteRecord::from(&Transaction::new(1.0, "Germany", "Japan", ts));
        let again = RouteRecord::from(&Transaction::new(2.0, "Germany", "Japan", ts));
        let reverse = RouteRecord::from(&Transaction::new(1.0, "Japan", "Germany", ts));

        assert!(forward.same_route(&again));
        assert!(!forward.same_route(&reverse));
    }

    #[test]
    fn test_ids_are_unique() {
        let ts = Utc::now();
        let a = Transaction::new(1.0, "Germany", "Japan", ts);
        let b = Transaction::new(1.0, "Germany", "Japan", ts);
        assert_ne!(a.transaction_id, b.transaction_id);
    }
}
