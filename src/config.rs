//! Configuration management for the transaction anomaly feed

use crate::error::EngineError;
use anyhow::{Context, Result};
use chrono::FixedOffset;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Countries drawn by the transaction generator.
pub const DEFAULT_COUNTRIES: [&str; 25] = [
    "United States",
    "United Kingdom",
    "Canada",
    "Australia",
    "Germany",
    "France",
    "Japan",
    "China",
    "India",
    "Brazil",
    "Russia",
    "South Africa",
    "Nigeria",
    "Mexico",
    "Argentina",
    "South Korea",
    "Singapore",
    "Hong Kong",
    "Switzerland",
    "United Arab Emirates",
    "Netherlands",
    "Italy",
    "Spain",
    "Saudi Arabia",
    "Turkey",
];

/// Longest velocity window accepted, one day.
pub const MAX_VELOCITY_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Jurisdictions that flag a transaction. Not required to be a subset of the
/// generated countries.
pub const DEFAULT_HIGH_RISK_COUNTRIES: [&str; 5] = [
    "Nigeria",
    "Russia",
    "Turkey",
    "United Arab Emirates",
    "Pakistan",
];

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject carrying session open/close commands
    pub session_subject: String,
    /// Results for session `id` are published on `<prefix>.<id>`
    pub result_subject_prefix: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            session_subject: "feed.sessions".to_string(),
            result_subject_prefix: "feed.results".to_string(),
        }
    }
}

/// Rule thresholds for the anomaly evaluator
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Amounts strictly above this are flagged
    pub amount_threshold: f64,
    pub high_risk_countries: Vec<String>,
    /// First off-hours hour (inclusive)
    pub off_hours_start: u32,
    /// Last off-hours hour (exclusive)
    pub off_hours_end: u32,
    /// Same-route transactions (including the current one) that trigger the velocity rule
    pub velocity_threshold_count: usize,
    /// Trailing window for the velocity rule
    pub velocity_threshold_seconds: u64,
    /// Upper bound on records retained per session
    pub max_history: usize,
    /// Offset east of UTC used to read the hour of day
    pub utc_offset_minutes: i32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            amount_threshold: 50_000.0,
            high_risk_countries: DEFAULT_HIGH_RISK_COUNTRIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            off_hours_start: 0,
            off_hours_end: 6,
            velocity_threshold_count: 3,
            velocity_threshold_seconds: 30,
            max_history: 200,
            utc_offset_minutes: 0,
        }
    }
}

impl DetectionConfig {
    /// The pinned timezone shared by off-hours injection and detection.
    pub fn offset(&self) -> Result<FixedOffset, EngineError> {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).ok_or_else(|| {
            EngineError::InvalidConfig(format!(
                "utc_offset_minutes {} is outside +/-24h",
                self.utc_offset_minutes
            ))
        })
    }

    pub fn velocity_window(&self) -> Result<chrono::Duration, EngineError> {
        let secs = self.velocity_threshold_seconds;
        if secs == 0 || secs > MAX_VELOCITY_WINDOW_SECS {
            return Err(EngineError::InvalidConfig(format!(
                "detection.velocity_threshold_seconds must be within [1, {}], got {}",
                MAX_VELOCITY_WINDOW_SECS, secs
            )));
        }
        i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                EngineError::InvalidConfig(format!(
                    "detection.velocity_threshold_seconds {} is out of range",
                    secs
                ))
            })
    }
}

/// Synthetic transaction distribution
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Country set drawn uniformly for source and destination
    pub countries: Vec<String>,
    /// Amounts are drawn uniformly from `[0, max_amount)`
    pub max_amount: f64,
    /// Probability of moving a timestamp into the off-hours window
    pub off_hours_probability: f64,
}

impl GeneratorConfig {
    /// Routes need at least two distinct countries and no repeats.
    pub fn check_countries(&self) -> Result<(), EngineError> {
        let distinct: HashSet<&str> = self.countries.iter().map(String::as_str).collect();
        if distinct.len() != self.countries.len() {
            return Err(EngineError::InvalidConfig(
                "generator.countries contains duplicates".to_string(),
            ));
        }
        if distinct.len() < 2 {
            return Err(EngineError::InvalidConfig(format!(
                "generator.countries needs at least 2 entries to draw distinct routes, got {}",
                distinct.len()
            )));
        }
        Ok(())
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            countries: DEFAULT_COUNTRIES.iter().map(|c| c.to_string()).collect(),
            max_amount: 100_000.0,
            off_hours_probability: 0.15,
        }
    }
}

/// Per-session scheduling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Period between ticks in milliseconds
    pub tick_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2000,
        }
    }
}

impl SessionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Seconds between summary reports
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// The part of the configuration a session is built from.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub detection: DetectionConfig,
    pub generator: GeneratorConfig,
    pub session: SessionConfig,
}

impl EngineConfig {
    /// Reject configurations the engine cannot run, before any tick happens.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |msg: String| Err(EngineError::InvalidConfig(msg));

        self.generator.check_countries()?;
        if !(self.generator.max_amount > 0.0 && self.generator.max_amount.is_finite()) {
            return invalid(format!(
                "generator.max_amount must be positive, got {}",
                self.generator.max_amount
            ));
        }
        if !(0.0..=1.0).contains(&self.generator.off_hours_probability) {
            return invalid(format!(
                "generator.off_hours_probability must be within [0, 1], got {}",
                self.generator.off_hours_probability
            ));
        }

        let detection = &self.detection;
        if detection.off_hours_start >= detection.off_hours_end || detection.off_hours_end > 24 {
            return invalid(format!(
                "off-hours window [{}, {}) must satisfy start < end <= 24",
                detection.off_hours_start, detection.off_hours_end
            ));
        }
        if detection.amount_threshold.is_nan() || detection.amount_threshold < 0.0 {
            return invalid(format!(
                "detection.amount_threshold must be non-negative, got {}",
                detection.amount_threshold
            ));
        }
        if detection.velocity_threshold_count == 0 {
            return invalid("detection.velocity_threshold_count must be at least 1".to_string());
        }
        detection.velocity_window()?;
        if detection.max_history == 0 {
            return invalid("detection.max_history must be at least 1".to_string());
        }
        detection.offset()?;

        if self.session.tick_interval_ms == 0 {
            return invalid("session.tick_interval_ms must be at least 1".to_string());
        }

        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from `FEED_CONFIG`, or `config/config.toml` by default
    pub fn load() -> Result<Self> {
        let path = std::env::var("FEED_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path, with `FEED__SECTION__KEY` overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("FEED").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            detection: self.detection.clone(),
            generator: self.generator.clone(),
            session: self.session.clone(),
        }
    }
}
