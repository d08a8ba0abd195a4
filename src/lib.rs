//! Transaction Anomaly Feed Library
//!
//! Streams synthetic cross-border transactions to connected clients and flags
//! each one against amount, jurisdiction, off-hours and velocity heuristics.
//! Every client session owns its own generator, velocity window and schedule.

pub mod clock;
pub mod config;
pub mod consumer;
pub mod detection;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod producer;
pub mod session;
pub mod types;

pub use config::{AppConfig, EngineConfig};
pub use detection::{RuleEvaluator, VelocityWindow};
pub use error::EngineError;
pub use generator::TransactionGenerator;
pub use session::{ChannelSink, ResultSink, Session, SessionBuilder, SessionRegistry};
pub use types::{result::AnomalyResult, transaction::Transaction};
