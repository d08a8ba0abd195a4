//! Sessions keyed by connection id, created and destroyed 1:1 with client
//! connections by the transport.

use crate::error::EngineError;
use crate::session::lifecycle::{Session, SessionBuilder, SessionExit};
use crate::session::sink::ResultSink;
use std::collections::HashMap;
use tracing::{info, warn};

pub struct SessionRegistry {
    builder: SessionBuilder,
    sessions: HashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new(builder: SessionBuilder) -> Self {
        Self {
            builder,
            sessions: HashMap::new(),
        }
    }

    /// A client connected. An existing session with the same id is stopped
    /// first, so the new one always starts with an empty window.
    pub async fn on_start<S>(&mut self, session_id: &str, sink: S) -> Result<(), EngineError>
    where
        S: ResultSink + 'static,
    {
        if let Some(mut previous) = self.sessions.remove(session_id) {
            warn!(session_id = %session_id, "Session already open, restarting");
            previous.stop().await;
        }

        let session = self.builder.start(session_id, sink)?;
        self.sessions.insert(session_id.to_string(), session);
        info!(
            session_id = %session_id,
            active = self.sessions.len(),
            "Client connected"
        );
        Ok(())
    }

    /// A client disconnected or its transport failed. Unknown ids are ignored,
    /// so close and error paths may both call this.
    pub async fn on_stop(&mut self, session_id: &str) -> bool {
        match self.sessions.remove(session_id) {
            Some(mut session) => {
                session.stop().await;
                info!(
                    session_id = %session_id,
                    active = self.sessions.len(),
                    "Client disconnected"
                );
                true
            }
            None => false,
        }
    }

    /// Drop sessions whose tick loop ended on its own (failed delivery)
    pub async fn reap_finished(&mut self) -> usize {
        let finished: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.is_finished())
            .map(|(id, _)| id.clone())
            .collect();

        for id in &finished {
            if let Some(mut session) = self.sessions.remove(id) {
                if let SessionExit::DeliveryFailed(e) = session.stop().await {
                    warn!(session_id = %id, error = %e, "Reaped session after delivery failure");
                }
            }
        }

        finished.len()
    }

    pub async fn shutdown_all(&mut self) {
        let count = self.sessions.len();
        for (_, mut session) in self.sessions.drain() {
            session.stop().await;
        }
        info!(count = count, "All sessions stopped");
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
