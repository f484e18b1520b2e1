//! Critical-error sink - where unrecoverable critical faults are written

use chrono::{DateTime, Utc};
use faultline_common::{ErrorEvent, ErrorKind};
use serde::Serialize;
use tracing::error;

/// What gets persisted for an exhausted critical fault
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalErrorEntry {
    pub kind: ErrorKind,
    pub message: String,
    pub context: String,
    pub timestamp: DateTime<Utc>,
    pub attempts: u32,
}

impl CriticalErrorEntry {
    pub fn from_event(event: &ErrorEvent, attempts: u32) -> Self {
        Self {
            kind: event.kind,
            message: event.message.clone(),
            context: event.context.clone(),
            timestamp: event.timestamp,
            attempts,
        }
    }
}

/// Durable log for critical faults, supplied by the host application
pub trait CriticalErrorSink: Send + Sync {
    fn record(&self, entry: &CriticalErrorEntry) -> anyhow::Result<()>;
}

/// Default sink: one structured `error!` event per entry
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl CriticalErrorSink for TracingSink {
    fn record(&self, entry: &CriticalErrorEntry) -> anyhow::Result<()> {
        let json = serde_json::to_string(entry)?;
        error!(target: "faultline::critical", "{}", json);
        Ok(())
    }
}
