//! Fraud heuristics applied to every generated transaction.
//!
//! All rules run on every transaction, in a fixed order, and each one that
//! matches contributes its reason:
//! 1. amount above the threshold
//! 2. source or destination in the high-risk set
//! 3. local hour inside the off-hours window
//! 4. enough same-route transactions inside the velocity window

use crate::config::DetectionConfig;
use crate::detection::window::VelocityWindow;
use crate::error::EngineError;
use crate::types::result::{AnomalyReason, AnomalyResult};
use crate::types::transaction::{RouteRecord, Transaction};
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use std::collections::HashSet;

/// Stateless rule set. The velocity state lives in the caller's window, so one
/// evaluator can serve any number of sessions.
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    amount_threshold: f64,
    high_risk_countries: HashSet<String>,
    off_hours_start: u32,
    off_hours_end: u32,
    offset: FixedOffset,
    velocity_threshold_count: usize,
    velocity_window: chrono::Duration,
    max_history: usize,
}

impl RuleEvaluator {
    pub fn new(config: &DetectionConfig) -> Result<Self, EngineError> {
        Ok(Self {
            amount_threshold: config.amount_threshold,
            high_risk_countries: config.high_risk_countries.iter().cloned().collect(),
            off_hours_start: config.off_hours_start,
            off_hours_end: config.off_hours_end,
            offset: config.offset()?,
            velocity_threshold_count: config.velocity_threshold_count,
            velocity_window: config.velocity_window()?,
            max_history: config.max_history,
        })
    }

    /// An empty window sized for this rule set
    pub fn new_window(&self) -> VelocityWindow {
        VelocityWindow::new(self.velocity_window, self.max_history)
    }

    /// Label `tx`, recording its route in `window`. `now` is the instant the
    /// window ages its records against.
    pub fn evaluate(
        &self,
        tx: &Transaction,
        window: &mut VelocityWindow,
        now: DateTime<Utc>,
    ) -> AnomalyResult {
        let mut reasons = Vec::with_capacity(AnomalyReason::ALL.len());

        if tx.amount > self.amount_threshold {
            reasons.push(AnomalyReason::AmountThreshold);
        }

        if self.is_high_risk(&tx.source_country) || self.is_high_risk(&tx.dest_country) {
            reasons.push(AnomalyReason::HighRiskCountry);
        }

        if self.is_off_hours(tx.timestamp) {
            reasons.push(AnomalyReason::OffHours);
        }

        let similar = window.observe(RouteRecord::from(tx), now);
        if similar + 1 >= self.velocity_threshold_count {
            reasons.push(AnomalyReason::Velocity);
        }

        AnomalyResult::new(tx.clone(), reasons)
    }

    pub fn is_high_risk(&self, country: &str) -> bool {
        self.high_risk_countries.contains(country)
    }

    /// Hour of day read in the pinned offset, not the host's locale
    pub fn is_off_hours(&self, timestamp: DateTime<Utc>) -> bool {
        let hour = timestamp.with_timezone(&self.offset).hour();
        hour >= self.off_hours_start && hour < self.off_hours_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn evaluator() -> RuleEvaluator {
        RuleEvaluator::new(&DetectionConfig::default()).unwrap()
    }

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_amount_only() {
        let evaluator = evaluator();
        let mut window = evaluator.new_window();
        let tx = Transaction::new(60_000.0, "Germany", "Japan", at_hour(14));

        let result = evaluator.evaluate(&tx, &mut window, tx.timestamp);

        assert!(result.is_anomaly);
        assert_eq!(result.reason_text(), "Exceeds amount threshold");
    }

    #[test]
    fn test_amount_at_threshold_is_clean() {
        let evaluator = evaluator();
        let mut window = evaluator.new_window();
        let tx = Transaction::new(50_000.0, "Germany", "Japan", at_hour(14));

        let result = evaluator.evaluate(&tx, &mut window, tx.timestamp);

        assert!(!result.is_anomaly);
        assert!(result.reasons.is_empty());
        assert_eq!(result.reason_text(), "");
    }

    #[test]
    fn test_high_risk_and_off_hours() {
        let evaluator = evaluator();
        let mut window = evaluator.new_window();
        let tx = Transaction::new(100.0, "Nigeria", "Canada", at_hour(3));

        let result = evaluator.evaluate(&tx, &mut window, tx.timestamp);

        assert_eq!(
            result.reason_text(),
            "Involves a high-risk country; Unusual transaction time"
        );
    }

    #[test]
    fn test_high_risk_destination_outside_country_set() {
        let evaluator = evaluator();
        let mut window = evaluator.new_window();
        let tx = Transaction::new(100.0, "Germany", "Pakistan", at_hour(14));

        let result = evaluator.evaluate(&tx, &mut window, tx.timestamp);

        assert_eq!(result.reasons, vec![AnomalyReason::HighRiskCountry]);
    }

    #[test]
    fn test_off_hours_boundaries() {
        let evaluator = evaluator();
        assert!(evaluator.is_off_hours(at_hour(0)));
        assert!(evaluator.is_off_hours(at_hour(5)));
        assert!(!evaluator.is_off_hours(at_hour(6)));
        assert!(!evaluator.is_off_hours(at_hour(23)));
    }

    #[test]
    fn test_rejects_window_chrono_cannot_hold() {
        let config = DetectionConfig {
            velocity_threshold_seconds: u64::MAX,
            ..DetectionConfig::default()
        };
        assert!(matches!(
            RuleEvaluator::new(&config),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_off_hours_uses_pinned_offset() {
        let config = DetectionConfig {
            utc_offset_minutes: 9 * 60,
            ..DetectionConfig::default()
        };
        let evaluator = RuleEvaluator::new(&config).unwrap();

        // 18:00 UTC is 03:00 the next day at UTC+9
        assert!(evaluator.is_off_hours(at_hour(18)));
        assert!(!evaluator.is_off_hours(at_hour(3)));
    }

    #[test]
    fn test_third_repeat_within_window_is_velocity() {
        let evaluator = evaluator();
        let mut window = evaluator.new_window();
        let start = at_hour(14);

        let outcomes: Vec<AnomalyResult> = (0..3)
            .map(|i| {
                let ts = start + Duration::seconds(5 * i);
                let tx = Transaction::new(100.0, "Germany", "Japan", ts);
                evaluator.evaluate(&tx, &mut window, ts)
            })
            .collect();

        assert!(!outcomes[0].is_anomaly);
        assert!(!outcomes[1].is_anomaly);
        assert_eq!(outcomes[2].reason_text(), "Rapid repeated transactions");
    }

    #[test]
    fn test_velocity_resets_after_window() {
        let evaluator = evaluator();
        let mut window = evaluator.new_window();
        let start = at_hour(14);

        for i in 0..2 {
            let ts = start + Duration::seconds(i);
            let tx = Transaction::new(100.0, "Germany", "Japan", ts);
            evaluator.evaluate(&tx, &mut window, ts);
        }

        let late = start + Duration::seconds(40);
        let tx = Transaction::new(100.0, "Germany", "Japan", late);
        let result = evaluator.evaluate(&tx, &mut window, late);
        assert!(!result.is_anomaly);
    }

    #[test]
    fn test_all_rules_in_order() {
        let evaluator = evaluator();
        let mut window = evaluator.new_window();
        let ts = at_hour(2);

        let mut last = None;
        for _ in 0..3 {
            let tx = Transaction::new(90_000.0, "Russia", "Turkey", ts);
            last = Some(evaluator.evaluate(&tx, &mut window, ts));
        }

        let result = last.unwrap();
        assert_eq!(result.reasons, AnomalyReason::ALL.to_vec());
        assert_eq!(
            result.reason_text(),
            "Exceeds amount threshold; Involves a high-risk country; \
             Unusual transaction time; Rapid repeated transactions"
        );
    }

    #[test]
    fn test_window_updated_even_when_other_rules_fire() {
        let evaluator = evaluator();
        let mut window = evaluator.new_window();
        let tx = Transaction::new(90_000.0, "Germany", "Japan", at_hour(14));

        evaluator.evaluate(&tx, &mut window, tx.timestamp);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_threshold_of_one_flags_every_transaction() {
        let config = DetectionConfig {
            velocity_threshold_count: 1,
            ..DetectionConfig::default()
        };
        let evaluator = RuleEvaluator::new(&config).unwrap();
        let mut window = evaluator.new_window();
        let tx = Transaction::new(100.0, "Germany", "Japan", at_hour(14));

        let result = evaluator.evaluate(&tx, &mut window, tx.timestamp);
        assert_eq!(result.reasons, vec![AnomalyReason::Velocity]);
    }

    #[test]
    fn test_is_deterministic_for_same_state() {
        let evaluator = evaluator();
        let mut a = evaluator.new_window();
        let mut b = evaluator.new_window();
        let tx = Transaction::new(100.0, "Germany", "Japan", at_hour(14));

        for _ in 0..4 {
            let left = evaluator.evaluate(&tx, &mut a, tx.timestamp);
            let right = evaluator.evaluate(&tx, &mut b, tx.timestamp);
            assert_eq!(left, right);
            assert_eq!(left.is_anomaly, !left.reasons.is_empty());
        }
    }
}
