//! Destinations for a session's results

use crate::types::result::AnomalyResult;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Receives one result per tick. An error ends the session; the engine never
/// retries a failed delivery.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn deliver(&self, result: &AnomalyResult) -> Result<()>;
}

/// In-process sink backed by a bounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<AnomalyResult>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<AnomalyResult>) -> Self {
        Self { tx }
    }

    /// Create a sink and the receiver it feeds
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<AnomalyResult>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl ResultSink for ChannelSink {
    async fn deliver(&self, result: &AnomalyResult) -> Result<()> {
        self.tx
            .send(result.clone())
            .await
            .map_err(|_| anyhow!("result receiver closed"))
    }
}
