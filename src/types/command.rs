//! Session control messages sent by clients

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionAction {
    /// Client connected; start streaming
    Open,
    /// Client disconnected
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCommand {
    pub session_id: String,
    pub action: SessionAction,
}

impl SessionCommand {
    pub fn open(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            action: SessionAction::Open,
        }
    }

    pub fn close(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            action: SessionAction::Close,
        }
    }
}
