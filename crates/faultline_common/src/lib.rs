//! Faultline Common - shared types for the fault intake and recovery engine
//!
//! Pure data: the fault taxonomy, accepted events and ledger records,
//! derived statistics, configuration, the platform log classifier, and
//! user-facing message formatting. Nothing here schedules or spawns.

pub mod classifier;
pub mod config;
pub mod error;
pub mod event;
pub mod kind;
pub mod messages;
pub mod stats;

pub use classifier::LogClassifier;
pub use config::{Config, EngineConfig, LoggingConfig, CONFIG_PATH};
pub use error::ConfigError;
pub use event::{ErrorCause, ErrorEvent, ErrorRecord};
pub use kind::{ErrorKind, Severity};
pub use messages::{MessageFormatter, PlainMessages};
pub use stats::Statistics;
