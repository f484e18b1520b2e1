//! Per-kind recovery bookkeeping

use crate::scheduler::TimerHandle;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Where a kind currently sits in the recovery state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPhase {
    /// Nothing pending
    Idle,
    /// Waiting for the next attempt's timer
    Scheduled,
    /// Recovery action running
    Attempting,
}

/// Read-only view of a kind's recovery bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryState {
    pub attempts: u32,
    pub last_error_time: Option<DateTime<Utc>>,
    pub phase: RecoveryPhase,
}

/// Identifies one scheduled recovery run for a kind.
///
/// The generation is bumped whenever pending work is cancelled, so a timer
/// that already fired cannot start an attempt for a cancelled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccurrenceToken {
    pub generation: u64,
}

/// Mutable state for one kind, owned by the orchestrator
#[derive(Debug)]
pub(crate) struct KindRecovery {
    pub attempts: u32,
    pub last_error_time: Option<DateTime<Utc>>,
    pub phase: RecoveryPhase,
    pub generation: u64,
    pub timer: Option<TimerHandle>,
}

impl Default for KindRecovery {
    fn default() -> Self {
        Self {
            attempts: 0,
            last_error_time: None,
            phase: RecoveryPhase::Idle,
            generation: 0,
            timer: None,
        }
    }
}

impl KindRecovery {
    pub fn view(&self) -> RecoveryState {
        RecoveryState {
            attempts: self.attempts,
            last_error_time: self.last_error_time,
            phase: self.phase,
        }
    }

    pub fn token(&self) -> OccurrenceToken {
        OccurrenceToken {
            generation: self.generation,
        }
    }

    pub fn is_current(&self, token: OccurrenceToken) -> bool {
        self.generation == token.generation
    }

    /// Drop pending work. Returns true if a scheduled timer was cancelled.
    ///
    /// A run already `Attempting` keeps going, but its generation no longer
    /// matches so it will not schedule a retry.
    pub fn cancel(&mut self) -> bool {
        self.generation = self.generation.wrapping_add(1);
        let was_scheduled = self.phase == RecoveryPhase::Scheduled;
        if let Some(timer) = self.timer.take() {
            if was_scheduled {
                timer.cancel();
            }
        }
        if was_scheduled {
            self.phase = RecoveryPhase::Idle;
        }
        was_scheduled
    }

    /// Return to idle after a run resolves
    pub fn settle(&mut self) {
        self.phase = RecoveryPhase::Idle;
        self.timer = None;
    }
}

/// Delay before the attempt following `retries` failed attempts in one run
pub fn backoff_delay(base: Duration, retries: u32) -> Duration {
    2u32.checked_pow(retries)
        .and_then(|factor| base.checked_mul(factor))
        .unwrap_or(Duration::MAX)
}
