//! Faultline daemon library - fault intake, recovery orchestration, safe mode.
//!
//! Feature modules report faults through an [`ErrorEngine`] handle. The
//! engine deduplicates bursts, keeps a bounded history, retries registered
//! recovery actions with exponential backoff, and degrades into safe mode
//! when a critical fault cannot be corrected.

pub mod command_action;
pub mod engine;
pub mod gate;
pub mod ledger;
pub mod notify;
pub mod orchestrator;
pub mod registry;
pub mod safe_mode;
pub mod scheduler;
pub mod sink;

pub use command_action::CommandAction;
pub use engine::{BuildError, EngineBuilder, ErrorEngine, ReportOutcome, PLATFORM_LOG_CONTEXT};
pub use notify::{EngineObserver, Notification};
pub use orchestrator::{RecoveryPhase, RecoveryState};
pub use registry::{recovery_fn, RecoveryAction};
pub use safe_mode::{SafeModeStatus, Subsystem};
pub use scheduler::{ScheduledTask, Scheduler, TimerHandle, TokioScheduler};
pub use sink::{CriticalErrorEntry, CriticalErrorSink, TracingSink};
