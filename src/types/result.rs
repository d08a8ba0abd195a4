//! Evaluation results and their wire representation

use crate::types::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used when reasons are rendered as one string
pub const REASON_SEPARATOR: &str = "; ";

/// A triggered rule. Variant order is the rule evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnomalyReason {
    AmountThreshold,
    HighRiskCountry,
    OffHours,
    Velocity,
}

impl AnomalyReason {
    pub const ALL: [AnomalyReason; 4] = [
        AnomalyReason::AmountThreshold,
        AnomalyReason::HighRiskCountry,
        AnomalyReason::OffHours,
        AnomalyReason::Velocity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyReason::AmountThreshold => "Exceeds amount threshold",
            AnomalyReason::HighRiskCountry => "Involves a high-risk country",
            AnomalyReason::OffHours => "Unusual transaction time",
            AnomalyReason::Velocity => "Rapid repeated transactions",
        }
    }

    /// Position in [`AnomalyReason::ALL`]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for AnomalyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transaction labeled by the rule evaluator
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyResult {
    pub transaction: Transaction,
    /// True iff `reasons` is non-empty
    pub is_anomaly: bool,
    pub reasons: Vec<AnomalyReason>,
}

impl AnomalyResult {
    pub fn new(transaction: Transaction, reasons: Vec<AnomalyReason>) -> Self {
        Self {
            transaction,
            is_anomaly: !reasons.is_empty(),
            reasons,
        }
    }

    /// Reasons joined with `"; "`, empty when nothing fired
    pub fn reason_text(&self) -> String {
        self.reasons
            .iter()
            .map(AnomalyReason::as_str)
            .collect::<Vec<_>>()
            .join(REASON_SEPARATOR)
    }

    pub fn to_message(&self) -> ResultMessage {
        ResultMessage::from(self)
    }
}

/// Serialized result pushed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMessage {
    pub transaction_id: String,
    pub amount: f64,
    pub source_country: String,
    pub dest_country: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub is_anomaly: bool,
    pub reason: String,
}

impl From<&AnomalyResult> for ResultMessage {
    fn from(result: &AnomalyResult) -> Self {
        let tx = &result.transaction;
        Self {
            transaction_id: tx.transaction_id.clone(),
            amount: tx.amount,
            source_country: tx.source_country.clone(),
            dest_country: tx.dest_country.clone(),
            timestamp: tx.timestamp.timestamp_millis(),
            is_anomaly: result.is_anomaly,
            reason: result.reason_text(),
        }
    }
}
