//! Accepted fault occurrences and the ledger records that wrap them.

use crate::kind::{ErrorKind, Severity};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use uuid::Uuid;

/// Opaque underlying error attached to a report
pub type ErrorCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Immutable description of one accepted fault
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub id: Uuid,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(serialize_with = "serialize_cause")]
    pub cause: Option<ErrorCause>,
    /// Free-form origin hint, e.g. the reporting module
    pub context: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
}

impl ErrorEvent {
    /// Build an event stamped now, with the kind's fixed severity
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        cause: Option<ErrorCause>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            cause,
            context: context.into(),
            timestamp: Utc::now(),
            severity: kind.severity(),
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }

    /// One-line description used in logs
    pub fn describe(&self) -> String {
        let mut line = format!("[{}] {}: {}", self.severity, self.kind, self.message);
        if !self.context.is_empty() {
            line.push_str(&format!(" (context: {})", self.context));
        }
        if let Some(cause) = &self.cause {
            line.push_str(&format!(" caused by: {}", cause));
        }
        line
    }
}

fn serialize_cause<S>(cause: &Option<ErrorCause>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match cause {
        Some(c) => serializer.serialize_some(&c.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Ledger entry for an accepted event
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub event: ErrorEvent,
    pub recovery_attempted: bool,
    pub recovery_successful: bool,
}

impl ErrorRecord {
    pub fn new(event: ErrorEvent, recovery_attempted: bool) -> Self {
        Self {
            event,
            recovery_attempted,
            recovery_successful: false,
        }
    }
}
