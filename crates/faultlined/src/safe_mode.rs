//! Safe mode - global degradation switch
//!
//! Entered when a critical fault cannot be recovered. Non-essential
//! subsystems are switched off and stay off until [`SafeModeController::exit`]
//! is called from outside; there is no automatic exit.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// A feature that can be switched off to reduce load or risk
pub trait Subsystem: Send + Sync {
    fn name(&self) -> &str;
    fn enable(&self) -> anyhow::Result<()>;
    fn disable(&self) -> anyhow::Result<()>;
}

struct Registered {
    subsystem: Arc<dyn Subsystem>,
    essential: bool,
}

/// Public view of safe mode
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafeModeStatus {
    pub active: bool,
    pub reason: Option<String>,
    pub since: Option<DateTime<Utc>>,
    /// Subsystems safe mode switched off
    pub disabled: Vec<String>,
}

#[derive(Default)]
struct Inner {
    subsystems: Vec<Registered>,
    active: bool,
    reason: Option<String>,
    since: Option<DateTime<Utc>>,
    disabled: Vec<Arc<dyn Subsystem>>,
    /// Bumped on every entry so a stale `enter` can tell it was exited meanwhile
    epoch: u64,
}

/// Tracks safe mode and the subsystems it controls
#[derive(Default)]
pub struct SafeModeController {
    inner: Mutex<Inner>,
}

impl SafeModeController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subsystem. Essential ones are never disabled.
    pub fn register(&self, subsystem: Arc<dyn Subsystem>, essential: bool) {
        let mut inner = self.lock();
        inner.subsystems.push(Registered {
            subsystem,
            essential,
        });
    }

    /// Enter safe mode. Returns false if it was already active.
    pub fn enter(&self, reason: &str) -> bool {
        let (epoch, targets): (u64, Vec<Arc<dyn Subsystem>>) = {
            let mut inner = self.lock();
            if inner.active {
                return false;
            }
            inner.active = true;
            inner.reason = Some(reason.to_string());
            inner.since = Some(Utc::now());
            inner.epoch = inner.epoch.wrapping_add(1);
            let targets = inner
                .subsystems
                .iter()
                .filter(|r| !r.essential)
                .map(|r| Arc::clone(&r.subsystem))
                .collect();
            (inner.epoch, targets)
        };

        warn!("Entering safe mode: {}", reason);

        let mut disabled = Vec::new();
        for subsystem in targets {
            match subsystem.disable() {
                Ok(()) => {
                    info!("Safe mode disabled subsystem {}", subsystem.name());
                    disabled.push(subsystem);
                }
                Err(e) => warn!("Failed to disable {}: {:#}", subsystem.name(), e),
            }
        }

        let stale = {
            let mut inner = self.lock();
            if inner.active && inner.epoch == epoch {
                inner.disabled.extend(disabled);
                None
            } else {
                Some(disabled)
            }
        };

        // Exited while subsystems were being disabled
        if let Some(disabled) = stale {
            info!("Safe mode exited during entry, re-enabling subsystems");
            for subsystem in disabled {
                if let Err(e) = subsystem.enable() {
                    warn!("Failed to re-enable {}: {:#}", subsystem.name(), e);
                }
            }
        }
        true
    }

    /// Leave safe mode and re-enable what it disabled. Returns false if not active.
    pub fn exit(&self) -> bool {
        let disabled = {
            let mut inner = self.lock();
            if !inner.active {
                return false;
            }
            inner.active = false;
            inner.reason = None;
            inner.since = None;
            std::mem::take(&mut inner.disabled)
        };

        info!("Leaving safe mode");
        for subsystem in disabled {
            if let Err(e) = subsystem.enable() {
                warn!("Failed to re-enable {}: {:#}", subsystem.name(), e);
            }
        }
        true
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn status(&self) -> SafeModeStatus {
        let inner = self.lock();
        SafeModeStatus {
            active: inner.active,
            reason: inner.reason.clone(),
            since: inner.since,
            disabled: inner
                .disabled
                .iter()
                .map(|s| s.name().to_string())
                .collect(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
