//! Error types surfaced by the anomaly engine

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration the engine cannot run with; raised when a session is built.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The sink refused a result; the owning session stops.
    #[error("result delivery failed: {0}")]
    Delivery(#[source] anyhow::Error),
}
