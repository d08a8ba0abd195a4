//! Synthetic transaction generator.
//!
//! Draws routes uniformly from the configured country set, amounts uniformly
//! from `[0, max_amount)`, and moves a fixed share of timestamps into the
//! off-hours window so that rule is exercised at a known rate.

use crate::clock::Clock;
use crate::config::{DetectionConfig, GeneratorConfig};
use crate::error::EngineError;
use crate::types::transaction::Transaction;
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Destination redraws before falling back to a direct draw over the other countries
const MAX_DEST_DRAWS: usize = 32;

pub struct TransactionGenerator {
    countries: Arc<[String]>,
    max_amount: f64,
    off_hours_probability: f64,
    off_hours_start: u32,
    off_hours_end: u32,
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
    rng: StdRng,
}

impl TransactionGenerator {
    /// Create a generator seeded from OS entropy
    pub fn new(
        generator: &GeneratorConfig,
        detection: &DetectionConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        Self::with_rng(generator, detection, clock, StdRng::from_entropy())
    }

    /// Create a generator with a seed, producing a reproducible sequence
    pub fn with_seed(
        generator: &GeneratorConfig,
        detection: &DetectionConfig,
        clock: Arc<dyn Clock>,
        seed: u64,
    ) -> Result<Self, EngineError> {
        Self::with_rng(generator, detection, clock, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        generator: &GeneratorConfig,
        detection: &DetectionConfig,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Result<Self, EngineError> {
        generator.check_countries()?;
        if !(generator.max_amount > 0.0 && generator.max_amount.is_finite()) {
            return Err(EngineError::InvalidConfig(format!(
                "generator max_amount must be positive, got {}",
                generator.max_amount
            )));
        }
        if detection.off_hours_start >= detection.off_hours_end || detection.off_hours_end > 24 {
            return Err(EngineError::InvalidConfig(format!(
                "off-hours window [{}, {}) is empty or exceeds a day",
                detection.off_hours_start, detection.off_hours_end
            )));
        }

        Ok(Self {
            countries: generator.countries.clone().into(),
            max_amount: generator.max_amount,
            off_hours_probability: if generator.off_hours_probability.is_nan() {
                0.0
            } else {
                generator.off_hours_probability.clamp(0.0, 1.0)
            },
            off_hours_start: detection.off_hours_start,
            off_hours_end: detection.off_hours_end,
            offset: detection.offset()?,
            clock,
            rng,
        })
    }

    /// Produce the next transaction
    pub fn next(&mut self) -> Transaction {
        let source_idx = self.rng.gen_range(0..self.countries.len());
        let dest_idx = self.draw_destination(source_idx);

        let now = self.clock.now();
        let timestamp = if self.rng.gen_bool(self.off_hours_probability) {
            self.off_hours_timestamp(now)
        } else {
            now
        };

        Transaction {
            transaction_id: uuid::Builder::from_random_bytes(self.rng.gen())
                .into_uuid()
                .to_string(),
            amount: self.rng.gen_range(0.0..self.max_amount),
            source_country: self.countries[source_idx].clone(),
            dest_country: self.countries[dest_idx].clone(),
            timestamp,
        }
    }

    fn draw_destination(&mut self, source_idx: usize) -> usize {
        let n = self.countries.len();
        for _ in 0..MAX_DEST_DRAWS {
            let idx = self.rng.gen_range(0..n);
            if idx != source_idx {
                return idx;
            }
        }
        (source_idx + self.rng.gen_range(1..n)) % n
    }

    /// Today's date in the pinned offset, at a random off-hours hour and minute
    fn off_hours_timestamp(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let hour = self.rng.gen_range(self.off_hours_start..self.off_hours_end);
        let minute = self.rng.gen_range(0..60);

        now.with_timezone(&self.offset)
            .with_hour(hour)
            .and_then(|t| t.with_minute(minute))
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(now)
    }
}
