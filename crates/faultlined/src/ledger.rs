//! History ledger - bounded FIFO of accepted error records

use faultline_common::{ErrorEvent, ErrorKind, ErrorRecord, Statistics};
use std::collections::VecDeque;
use uuid::Uuid;

/// In-memory audit trail of accepted faults, oldest first
#[derive(Debug, Clone)]
pub struct HistoryLedger {
    records: VecDeque<ErrorRecord>,
    capacity: usize,
}

impl HistoryLedger {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, evicting the oldest first when full
    pub fn append(&mut self, record: ErrorRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Independent copy of every record, oldest first
    pub fn snapshot(&self) -> Vec<ErrorRecord> {
        self.records.iter().cloned().collect()
    }

    /// Copy of the newest `count` records, oldest first
    pub fn recent(&self, count: usize) -> Vec<ErrorRecord> {
        let skip = self.records.len().saturating_sub(count);
        self.records.iter().skip(skip).cloned().collect()
    }

    /// Most recent event of `kind`, if one is still held
    pub fn latest_of(&self, kind: ErrorKind) -> Option<ErrorEvent> {
        self.records
            .iter()
            .rev()
            .find(|r| r.event.kind == kind)
            .map(|r| r.event.clone())
    }

    /// Flag the record for `event_id` as recovered. Returns false if it was evicted.
    pub fn mark_recovered(&mut self, event_id: Uuid) -> bool {
        match self
            .records
            .iter_mut()
            .rev()
            .find(|r| r.event.id == event_id)
        {
            Some(record) => {
                record.recovery_successful = true;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn statistics<F>(&self, attempts_of: F) -> Statistics
    where
        F: Fn(ErrorKind) -> u32,
    {
        Statistics::from_records(&self.records, attempts_of)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
