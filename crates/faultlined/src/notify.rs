//! Notification fan-out to observers and broadcast subscribers

use faultline_common::{ErrorEvent, ErrorKind, Severity};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Broadcast buffer; slow subscribers lag rather than block the engine
const CHANNEL_CAPACITY: usize = 256;

/// Something external layers need to know about
#[derive(Debug, Clone)]
pub enum Notification {
    /// A report passed the cooldown gate and was recorded
    ErrorOccurred(ErrorEvent),
    /// A recovery action fixed the condition behind this event
    ErrorRecovered(ErrorEvent),
    /// Text to show the user
    UserMessage {
        kind: ErrorKind,
        severity: Severity,
        text: String,
    },
    /// Recovery attempts for this event ran out
    Unrecoverable { event: ErrorEvent, attempts: u32 },
    /// Safe mode engaged; `message` is the user-facing text
    SafeModeEntered { reason: String, message: String },
    SafeModeExited,
}

impl Notification {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ErrorOccurred(_) => "error_occurred",
            Self::ErrorRecovered(_) => "error_recovered",
            Self::UserMessage { .. } => "user_message",
            Self::Unrecoverable { .. } => "unrecoverable",
            Self::SafeModeEntered { .. } => "safe_mode_entered",
            Self::SafeModeExited => "safe_mode_exited",
        }
    }
}

/// Synchronous observer, called in registration order
pub trait EngineObserver: Send + Sync {
    fn on_notification(&self, notification: &Notification);
}

impl<F> EngineObserver for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn on_notification(&self, notification: &Notification) {
        self(notification)
    }
}

/// Delivers notifications to every observer and subscriber
pub struct Notifier {
    observers: RwLock<Vec<Arc<dyn EngineObserver>>>,
    sender: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            observers: RwLock::new(Vec::new()),
            sender,
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn EngineObserver>) {
        self.observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(observer);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Deliver to observers, then broadcast. Never call while holding engine state.
    ///
    /// A panicking observer is logged and skipped; the rest still run.
    pub fn emit(&self, notification: Notification) {
        debug!("Notification: {}", notification.name());

        let observers: Vec<_> = self
            .observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for observer in observers {
            let delivered =
                panic::catch_unwind(AssertUnwindSafe(|| observer.on_notification(&notification)));
            if delivered.is_err() {
                warn!("Observer panicked handling {}", notification.name());
            }
        }

        // No subscribers is fine
        let _ = self.sender.send(notification);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
