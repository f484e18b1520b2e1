//! Recovery Orchestrator
//!
//! Drives the per-kind retry state machine:
//!
//! ```text
//! Idle ──report──► Scheduled ──timer──► Attempting ──ok──► Idle (attempts = 0)
//!                      ▲                    │
//!                      └──fail, budget left─┤
//!                                           └──fail, budget spent──► Idle (escalated)
//! ```
//!
//! Gate, ledger, and per-kind bookkeeping share one mutex. It is never held
//! across an `.await`, and notifications, actions, sink writes, and
//! subsystem toggles all run after it is released.

pub mod state;

pub use state::{backoff_delay, OccurrenceToken, RecoveryPhase, RecoveryState};

use crate::gate::CooldownGate;
use crate::ledger::HistoryLedger;
use crate::notify::{Notification, Notifier};
use crate::registry::{self, RecoveryRegistry};
use crate::safe_mode::SafeModeController;
use crate::scheduler::{ScheduledTask, Scheduler};
use crate::sink::{CriticalErrorEntry, CriticalErrorSink};
use faultline_common::{EngineConfig, ErrorEvent, ErrorKind, MessageFormatter, Statistics};
use state::KindRecovery;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, error, info, warn};

/// Everything guarded by the engine mutex
pub(crate) struct EngineState {
    pub gate: CooldownGate,
    pub ledger: HistoryLedger,
    pub recovery: HashMap<ErrorKind, KindRecovery>,
}

impl EngineState {
    fn new(config: &EngineConfig) -> Self {
        Self {
            gate: CooldownGate::new(config.cooldown()),
            ledger: HistoryLedger::new(config.max_error_history_size),
            recovery: HashMap::new(),
        }
    }

    pub fn attempts(&self, kind: ErrorKind) -> u32 {
        self.recovery.get(&kind).map(|r| r.attempts).unwrap_or(0)
    }

    pub fn statistics(&self) -> Statistics {
        self.ledger.statistics(|kind| self.attempts(kind))
    }
}

/// Outcome of one attempt, decided under the lock and acted on after it
enum Next {
    Recovered,
    Retry(std::time::Duration),
    Exhausted(u32),
    Dropped,
}

/// Shared engine core
pub struct Orchestrator {
    pub(crate) config: EngineConfig,
    state: Mutex<EngineState>,
    pub(crate) registry: RwLock<RecoveryRegistry>,
    scheduler: Arc<dyn Scheduler>,
    pub(crate) notifier: Notifier,
    pub(crate) safe_mode: SafeModeController,
    sink: Arc<dyn CriticalErrorSink>,
    pub(crate) formatter: Arc<dyn MessageFormatter>,
}

impl Orchestrator {
    pub(crate) fn new(
        config: EngineConfig,
        scheduler: Arc<dyn Scheduler>,
        sink: Arc<dyn CriticalErrorSink>,
        formatter: Arc<dyn MessageFormatter>,
    ) -> Self {
        Self {
            state: Mutex::new(EngineState::new(&config)),
            config,
            registry: RwLock::new(RecoveryRegistry::new()),
            scheduler,
            notifier: Notifier::new(),
            safe_mode: SafeModeController::new(),
            sink,
            formatter,
        }
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_recovery_attempts
    }

    /// Start a recovery run for `event` if its kind is idle and has budget left.
    ///
    /// Returns true when the first attempt was scheduled.
    pub(crate) fn begin(self: &Arc<Self>, state: &mut EngineState, event: &ErrorEvent) -> bool {
        let max = self.max_attempts();
        let entry = state.recovery.entry(event.kind).or_default();

        if entry.attempts >= max {
            debug!("Recovery budget spent for {}, not scheduling", event.kind);
            return false;
        }
        if entry.phase != RecoveryPhase::Idle {
            debug!(
                "Recovery for {} already {:?}, ignoring new occurrence",
                event.kind, entry.phase
            );
            return false;
        }

        let delay = backoff_delay(self.config.recovery_delay(), 0);
        entry.phase = RecoveryPhase::Scheduled;
        let task = self.attempt_task(event.clone(), entry.token(), 0);
        entry.timer = Some(self.scheduler.schedule(delay, task));
        debug!("Scheduled recovery for {} in {:?}", event.kind, delay);
        true
    }

    fn attempt_task(
        self: &Arc<Self>,
        event: ErrorEvent,
        token: OccurrenceToken,
        retries: u32,
    ) -> ScheduledTask {
        Box::pin(Arc::clone(self).run_attempt(event, token, retries))
    }

    /// Timer callback: one attempt of a recovery run
    async fn run_attempt(self: Arc<Self>, event: ErrorEvent, token: OccurrenceToken, retries: u32) {
        let max = self.max_attempts();
        let attempt = {
            let mut state = self.lock_state();
            let entry = state.recovery.entry(event.kind).or_default();
            if !entry.is_current(token) || entry.phase != RecoveryPhase::Scheduled {
                debug!("Stale recovery timer for {} ignored", event.kind);
                return;
            }
            entry.phase = RecoveryPhase::Attempting;
            entry.timer = None;
            entry.attempts = (entry.attempts + 1).min(max);
            entry.attempts
        };

        info!("Recovery attempt {}/{} for {}", attempt, max, event.kind);

        let action = self
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(event.kind);
        let recovered =
            registry::invoke(action, &event, self.config.recovery_timeout()).await;

        self.finish_attempt(event, token, retries, recovered);
    }

    fn finish_attempt(
        self: &Arc<Self>,
        event: ErrorEvent,
        token: OccurrenceToken,
        retries: u32,
        recovered: bool,
    ) {
        let max = self.max_attempts();
        let next = {
            let mut state = self.lock_state();
            let entry = state.recovery.entry(event.kind).or_default();

            let next = if recovered {
                entry.attempts = 0;
                entry.settle();
                Next::Recovered
            } else if !entry.is_current(token) {
                entry.settle();
                Next::Dropped
            } else if entry.attempts >= max {
                entry.settle();
                Next::Exhausted(entry.attempts)
            } else {
                let retries = retries + 1;
                let delay = backoff_delay(self.config.recovery_delay(), retries);
                entry.phase = RecoveryPhase::Scheduled;
                let task = self.attempt_task(event.clone(), token, retries);
                entry.timer = Some(self.scheduler.schedule(delay, task));
                Next::Retry(delay)
            };

            if recovered {
                state.ledger.mark_recovered(event.id);
            }
            next
        };

        match next {
            Next::Recovered => {
                info!("Recovered from {}", event.kind);
                self.notifier.emit(Notification::ErrorRecovered(event));
            }
            Next::Retry(delay) => {
                warn!("Recovery for {} failed, retrying in {:?}", event.kind, delay);
            }
            Next::Exhausted(attempts) => self.escalate(event, attempts),
            Next::Dropped => {
                debug!("Recovery run for {} was cancelled", event.kind);
            }
        }
    }

    /// Out of attempts: announce, and for critical faults persist and degrade
    fn escalate(&self, event: ErrorEvent, attempts: u32) {
        error!(
            "Unrecoverable {} after {} attempts: {}",
            event.kind, attempts, event.message
        );

        self.notifier.emit(Notification::Unrecoverable {
            event: event.clone(),
            attempts,
        });

        if self.config.show_user_friendly_messages {
            self.notifier.emit(Notification::UserMessage {
                kind: event.kind,
                severity: event.severity,
                text: self.formatter.unrecoverable_message(event.kind),
            });
        }

        if event.is_critical() {
            let entry = CriticalErrorEntry::from_event(&event, attempts);
            if let Err(e) = self.sink.record(&entry) {
                warn!("Critical error sink failed: {:#}", e);
            }
            self.enter_safe_mode(&format!(
                "unrecoverable {} after {} attempts",
                event.kind, attempts
            ));
        }
    }

    /// Enter safe mode once; later calls are no-ops
    pub(crate) fn enter_safe_mode(&self, reason: &str) -> bool {
        if !self.safe_mode.enter(reason) {
            return false;
        }
        self.notifier.emit(Notification::SafeModeEntered {
            reason: reason.to_string(),
            message: self.formatter.safe_mode_message(),
        });
        true
    }

    pub(crate) fn exit_safe_mode(&self) -> bool {
        if !self.safe_mode.exit() {
            return false;
        }
        self.notifier.emit(Notification::SafeModeExited);
        true
    }

    /// Invoke the action for `kind` once, now, leaving attempt counters alone.
    ///
    /// A successful forced recovery cancels any pending scheduled attempt.
    pub(crate) async fn force_recovery(&self, kind: ErrorKind) -> bool {
        let event = {
            let state = self.lock_state();
            state.ledger.latest_of(kind)
        }
        .unwrap_or_else(|| ErrorEvent::new(kind, "manual recovery", None, "force_recovery"));

        let action = self
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(kind);

        info!("Forcing recovery for {}", kind);
        let recovered =
            registry::invoke(action, &event, self.config.recovery_timeout()).await;

        if recovered && self.cancel(kind) {
            info!("Cancelled pending recovery for {} after forced recovery", kind);
        }
        recovered
    }

    /// Cancel a pending scheduled attempt for `kind`
    pub(crate) fn cancel(&self, kind: ErrorKind) -> bool {
        let mut state = self.lock_state();
        state
            .recovery
            .get_mut(&kind)
            .map(|entry| entry.cancel())
            .unwrap_or(false)
    }

    /// Cancel every pending scheduled attempt
    pub(crate) fn cancel_all(&self) -> usize {
        let mut state = self.lock_state();
        state
            .recovery
            .values_mut()
            .map(|entry| entry.cancel())
            .filter(|cancelled| *cancelled)
            .count()
    }

    /// Empty the ledger and zero every attempt counter
    pub(crate) fn clear_history(&self) {
        let mut state = self.lock_state();
        state.ledger.clear();
        for entry in state.recovery.values_mut() {
            entry.attempts = 0;
        }
        info!("Error history cleared");
    }

    pub(crate) fn recovery_state(&self, kind: ErrorKind) -> RecoveryState {
        self.lock_state()
            .recovery
            .get(&kind)
            .map(|entry| entry.view())
            .unwrap_or_else(|| KindRecovery::default().view())
    }

    /// True when no kind is scheduled or attempting
    pub(crate) fn is_idle(&self) -> bool {
        self.lock_state()
            .recovery
            .values()
            .all(|entry| entry.phase == RecoveryPhase::Idle)
    }
}
