//! Error engine - intake API and handle passed to every reporting module
//!
//! Build one engine at startup with [`ErrorEngine::builder`] and clone the
//! handle into whatever needs to report faults or register recovery actions.
//! All clones share the same state.

use crate::notify::{EngineObserver, Notification};
use crate::orchestrator::{Orchestrator, RecoveryState};
use crate::registry::RecoveryAction;
use crate::safe_mode::{SafeModeStatus, Subsystem};
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::sink::{CriticalErrorSink, TracingSink};
use faultline_common::{
    ConfigError, EngineConfig, ErrorCause, ErrorEvent, ErrorKind, ErrorRecord, LogClassifier,
    MessageFormatter, PlainMessages, Severity, Statistics,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info};

/// Context attached to reports that came from the platform log
pub const PLATFORM_LOG_CONTEXT: &str = "platform-log";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Invalid engine config: {0}")]
    Config(#[from] ConfigError),

    #[error("No tokio runtime available and no scheduler supplied")]
    NoRuntime,
}

/// What happened to a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Dropped by the cooldown gate
    Suppressed,
    /// Recorded; `recovery_scheduled` says whether a recovery run started
    Accepted { recovery_scheduled: bool },
}

impl ReportOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Assembles an [`ErrorEngine`] from its collaborators
pub struct EngineBuilder {
    config: EngineConfig,
    scheduler: Option<Arc<dyn Scheduler>>,
    sink: Arc<dyn CriticalErrorSink>,
    formatter: Arc<dyn MessageFormatter>,
    classifier: LogClassifier,
}

impl EngineBuilder {
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn CriticalErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn formatter(mut self, formatter: Arc<dyn MessageFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn classifier(mut self, classifier: LogClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Validate the config and build. Without an explicit scheduler this
    /// must run inside a tokio runtime.
    pub fn build(self) -> Result<ErrorEngine, BuildError> {
        self.config.validate()?;

        let scheduler = match self.scheduler {
            Some(s) => s,
            None => Arc::new(TokioScheduler::current().ok_or(BuildError::NoRuntime)?),
        };

        info!(
            "Error engine ready (auto_recovery={}, max_attempts={}, cooldown={:?})",
            self.config.enable_auto_recovery,
            self.config.max_recovery_attempts,
            self.config.cooldown()
        );

        Ok(ErrorEngine {
            core: Arc::new(Orchestrator::new(
                self.config,
                scheduler,
                self.sink,
                self.formatter,
            )),
            classifier: Arc::new(self.classifier),
        })
    }
}

/// Shared handle to the fault intake and recovery engine
#[derive(Clone)]
pub struct ErrorEngine {
    core: Arc<Orchestrator>,
    classifier: Arc<LogClassifier>,
}

impl ErrorEngine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            scheduler: None,
            sink: Arc::new(TracingSink),
            formatter: Arc::new(PlainMessages),
            classifier: LogClassifier::new(),
        }
    }

    /// Engine with default collaborators on the current tokio runtime
    pub fn new(config: EngineConfig) -> Result<Self, BuildError> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.core.config
    }

    // ------------------------------------------------------------------
    // Intake
    // ------------------------------------------------------------------

    pub fn report(&self, kind: ErrorKind, message: impl Into<String>) -> ReportOutcome {
        self.report_with(kind, message, None, "")
    }

    /// Report a fault caused by a typed error
    pub fn report_error<E>(
        &self,
        kind: ErrorKind,
        error: E,
        context: impl Into<String>,
    ) -> ReportOutcome
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let message = error.to_string();
        self.report_with(kind, message, Some(Arc::new(error)), context)
    }

    /// Full intake path. Never fails; suppressed reports leave no trace.
    pub fn report_with(
        &self,
        kind: ErrorKind,
        message: impl Into<String>,
        cause: Option<ErrorCause>,
        context: impl Into<String>,
    ) -> ReportOutcome {
        let now = Instant::now();
        let config = &self.core.config;

        let (event, recovery_wanted) = {
            let mut state = self.core.lock_state();
            if !state.gate.admit(kind, now) {
                return ReportOutcome::Suppressed;
            }

            let event = ErrorEvent::new(kind, message, cause, context);
            let recovery_wanted = config.enable_auto_recovery
                && state.attempts(kind) < config.max_recovery_attempts;

            state
                .ledger
                .append(ErrorRecord::new(event.clone(), recovery_wanted));
            state.gate.record(kind, now);
            state.recovery.entry(kind).or_default().last_error_time = Some(event.timestamp);
            (event, recovery_wanted)
        };

        if config.enable_detailed_logging {
            info!("Error reported: {}", event.describe());
        } else {
            debug!("Error reported: {} ({})", event.kind, event.severity);
        }

        self.core
            .notifier
            .emit(Notification::ErrorOccurred(event.clone()));

        if event.severity >= Severity::Warning && config.show_user_friendly_messages {
            self.core.notifier.emit(Notification::UserMessage {
                kind,
                severity: event.severity,
                text: self.core.formatter.user_message(kind, event.severity),
            });
        }

        let recovery_scheduled = recovery_wanted && {
            let mut state = self.core.lock_state();
            self.core.begin(&mut state, &event)
        };

        ReportOutcome::Accepted { recovery_scheduled }
    }

    /// Classify a platform log line and report it. Blank lines are skipped.
    pub fn ingest_log_line(&self, line: &str) -> Option<ReportOutcome> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let kind = self.classifier.classify(line);
        Some(self.report_with(kind, line, None, PLATFORM_LOG_CONTEXT))
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    pub fn register_recovery(&self, kind: ErrorKind, action: Arc<dyn RecoveryAction>) {
        self.core
            .registry
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .register(kind, action);
        debug!("Registered recovery action for {}", kind);
    }

    pub fn registered_kinds(&self) -> Vec<ErrorKind> {
        self.core
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .registered_kinds()
    }

    /// Register a subsystem safe mode may switch off. Essential ones stay on.
    pub fn register_subsystem(&self, subsystem: Arc<dyn Subsystem>, essential: bool) {
        self.core.safe_mode.register(subsystem, essential);
    }

    pub fn add_observer(&self, observer: Arc<dyn EngineObserver>) {
        self.core.notifier.add_observer(observer);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.core.notifier.subscribe()
    }

    // ------------------------------------------------------------------
    // Manual control
    // ------------------------------------------------------------------

    /// Run the recovery action for `kind` once, now. Attempt counters are untouched.
    pub async fn force_recovery(&self, kind: ErrorKind) -> bool {
        self.core.force_recovery(kind).await
    }

    /// Cancel a pending scheduled recovery for `kind`
    pub fn cancel_recovery(&self, kind: ErrorKind) -> bool {
        self.core.cancel(kind)
    }

    /// Empty the history and reset every kind's attempt counter
    pub fn clear_history(&self) {
        self.core.clear_history();
    }

    pub fn enter_safe_mode(&self, reason: &str) -> bool {
        self.core.enter_safe_mode(reason)
    }

    /// External reset out of safe mode
    pub fn exit_safe_mode(&self) -> bool {
        self.core.exit_safe_mode()
    }

    /// Cancel all pending recoveries
    pub fn shutdown(&self) {
        let cancelled = self.core.cancel_all();
        info!("Error engine shut down, {} pending recoveries cancelled", cancelled);
    }

    /// Wait until no recovery is scheduled or running, polling every `poll`
    pub async fn wait_idle(&self, poll: Duration) {
        while !self.core.is_idle() {
            tokio::time::sleep(poll).await;
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn history(&self) -> Vec<ErrorRecord> {
        self.core.lock_state().ledger.snapshot()
    }

    pub fn recent_errors(&self, count: usize) -> Vec<ErrorRecord> {
        self.core.lock_state().ledger.recent(count)
    }

    pub fn statistics(&self) -> Statistics {
        self.core.lock_state().statistics()
    }

    pub fn recovery_state(&self, kind: ErrorKind) -> RecoveryState {
        self.core.recovery_state(kind)
    }

    pub fn is_safe_mode(&self) -> bool {
        self.core.safe_mode.is_active()
    }

    pub fn safe_mode_status(&self) -> SafeModeStatus {
        self.core.safe_mode.status()
    }
}
