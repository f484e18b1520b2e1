//! Cooldown gate - drops repeat reports of one kind inside a time window

use faultline_common::ErrorKind;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Per-kind duplicate suppression
#[derive(Debug, Clone)]
pub struct CooldownGate {
    window: Duration,
    last_seen: HashMap<ErrorKind, Instant>,
}

impl CooldownGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_seen: HashMap::new(),
        }
    }

    /// Whether a report of `kind` at `now` may be accepted. Has no side effects.
    pub fn admit(&self, kind: ErrorKind, now: Instant) -> bool {
        match self.last_seen.get(&kind) {
            Some(last) => now.saturating_duration_since(*last) >= self.window,
            None => true,
        }
    }

    /// Remember an accepted report; call only once the event is recorded
    pub fn record(&mut self, kind: ErrorKind, now: Instant) {
        self.last_seen.insert(kind, now);
    }
}
