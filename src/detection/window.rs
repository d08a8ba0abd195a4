//! Bounded history of recent routes for the velocity rule

use crate::types::transaction::RouteRecord;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Recent routes seen by one session, in insertion order.
///
/// After every [`observe`](VelocityWindow::observe) no record is older than the
/// window and at most `max_history` records are held.
#[derive(Debug, Clone)]
pub struct VelocityWindow {
    records: VecDeque<RouteRecord>,
    window: Duration,
    max_history: usize,
}

impl VelocityWindow {
    pub fn new(window: Duration, max_history: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(max_history.min(256)),
            window,
            max_history,
        }
    }

    /// Record `record` and return how many retained records share its route,
    /// counted before it was inserted.
    pub fn observe(&mut self, record: RouteRecord, now: DateTime<Utc>) -> usize {
        // Injected timestamps are not monotonic, so purge by scanning rather than popping.
        let window = self.window;
        self.records.retain(|r| now - r.timestamp < window);

        let similar = self.records.iter().filter(|r| r.same_route(&record)).count();

        // A record already outside the window could never be counted again.
        if now - record.timestamp < window {
            self.records.push_back(record);
        }
        while self.records.len() > self.max_history {
            self.records.pop_front();
        }

        similar
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &RouteRecord> {
        self.records.iter()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }
}
