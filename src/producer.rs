//! NATS publisher for session results

use crate::session::sink::ResultSink;
use crate::types::result::AnomalyResult;
use anyhow::{Context, Result};
use async_nats::Client;
use async_trait::async_trait;
use tracing::debug;

/// Subject a session's results are published on
pub fn result_subject(prefix: &str, session_id: &str) -> String {
    format!("{}.{}", prefix, session_id)
}

/// Session ids become a subject token, so they may not contain separators or wildcards
pub fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && !session_id
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '.' | '*' | '>'))
}

/// Sink publishing each result as a JSON `ResultMessage`
#[derive(Clone)]
pub struct NatsResultSink {
    client: Client,
    subject: String,
}

impl NatsResultSink {
    pub fn new(client: Client, prefix: &str, session_id: &str) -> Self {
        Self {
            client,
            subject: result_subject(prefix, session_id),
        }
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[async_trait]
impl ResultSink for NatsResultSink {
    async fn deliver(&self, result: &AnomalyResult) -> Result<()> {
        let payload = serde_json::to_vec(&result.to_message())?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .with_context(|| format!("Failed to publish to {}", self.subject))?;

        debug!(
            subject = %self.subject,
            transaction_id = %result.transaction.transaction_id,
            is_anomaly = result.is_anomaly,
            "Published result"
        );

        Ok(())
    }
}
