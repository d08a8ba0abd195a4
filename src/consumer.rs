//! NATS consumer for session control commands

use crate::producer::is_valid_session_id;
use crate::types::command::SessionCommand;
use anyhow::{bail, Context, Result};
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tracing::{info, warn};

/// Consumer for receiving session open/close commands from NATS
pub struct SessionCommandConsumer {
    client: Client,
    subject: String,
}

impl SessionCommandConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the command subject
    pub async fn subscribe(&self) -> Result<SessionCommands> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to session command subject");
        Ok(SessionCommands {
            subscriber,
            skipped: 0,
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Decoded commands from a live subscription
pub struct SessionCommands {
    subscriber: Subscriber,
    skipped: u64,
}

impl SessionCommands {
    /// Wait for the next usable command. Payloads that fail to decode are
    /// logged and skipped. Returns `None` once the subscription closes.
    ///
    /// Cancel safe: a command is only consumed when it is returned.
    pub async fn next_command(&mut self) -> Option<SessionCommand> {
        while let Some(message) = self.subscriber.next().await {
            match parse_command(&message.payload) {
                Ok(command) => return Some(command),
                Err(e) => {
                    self.skipped += 1;
                    warn!(
                        error = %e,
                        skipped = self.skipped,
                        "Ignoring session command"
                    );
                }
            }
        }
        None
    }

    /// Payloads rejected so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

/// Decode a command payload. The session id must be usable as a subject token.
pub fn parse_command(payload: &[u8]) -> Result<SessionCommand> {
    let command: SessionCommand =
        serde_json::from_slice(payload).context("Malformed session command")?;
    if !is_valid_session_id(&command.session_id) {
        bail!("Invalid session id {:?}", command.session_id);
    }
    Ok(command)
}
