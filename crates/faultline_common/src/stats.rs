//! Aggregate statistics derived from the error history.

use crate::event::ErrorRecord;
use crate::kind::{ErrorKind, Severity};
use serde::Serialize;
use std::collections::BTreeMap;

/// Point-in-time summary of the ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total_errors: usize,
    pub total_recovery_attempts: usize,
    pub successful_recoveries: usize,
    /// successes / attempts, 0.0 when nothing was attempted
    pub success_rate: f64,
    pub by_kind: BTreeMap<ErrorKind, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
}

impl Statistics {
    /// Compute statistics over `records`.
    ///
    /// A recovery counts as successful when its record shows an attempt was
    /// made and the kind's current attempt counter (`attempts_of`) is zero.
    pub fn from_records<'a, I, F>(records: I, attempts_of: F) -> Self
    where
        I: IntoIterator<Item = &'a ErrorRecord>,
        F: Fn(ErrorKind) -> u32,
    {
        let mut stats = Statistics::default();

        for record in records {
            stats.total_errors += 1;
            *stats.by_kind.entry(record.event.kind).or_insert(0) += 1;
            *stats.by_severity.entry(record.event.severity).or_insert(0) += 1;

            if record.recovery_attempted {
                stats.total_recovery_attempts += 1;
                if attempts_of(record.event.kind) == 0 {
                    stats.successful_recoveries += 1;
                }
            }
        }

        if stats.total_recovery_attempts > 0 {
            stats.success_rate =
                stats.successful_recoveries as f64 / stats.total_recovery_attempts as f64;
        }

        stats
    }

    /// Kind with the most recorded errors; ties go to the earlier kind
    pub fn most_frequent_kind(&self) -> Option<ErrorKind> {
        let mut best: Option<(ErrorKind, usize)> = None;
        for (kind, count) in &self.by_kind {
            match best {
                Some((_, best_count)) if *count <= best_count => {}
                _ => best = Some((*kind, *count)),
            }
        }
        best.map(|(kind, _)| kind)
    }
}
