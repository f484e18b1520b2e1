//! Recovery registry - one corrective action per error kind
//!
//! Actions are supplied by feature modules. The registry never lets an
//! action's failure escape: errors, panics, and timeouts all become `false`.

use async_trait::async_trait;
use faultline_common::{ErrorEvent, ErrorKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Domain-specific corrective step for one kind of fault
#[async_trait]
pub trait RecoveryAction: Send + Sync {
    /// Try to correct the condition behind `event`. `Ok(true)` means recovered.
    async fn recover(&self, event: &ErrorEvent) -> anyhow::Result<bool>;
}

/// Adapter turning a plain closure into a [`RecoveryAction`]
pub struct FnAction<F> {
    f: F,
}

#[async_trait]
impl<F> RecoveryAction for FnAction<F>
where
    F: Fn(&ErrorEvent) -> bool + Send + Sync,
{
    async fn recover(&self, event: &ErrorEvent) -> anyhow::Result<bool> {
        Ok((self.f)(event))
    }
}

/// Wrap a synchronous closure as a recovery action
pub fn recovery_fn<F>(f: F) -> Arc<dyn RecoveryAction>
where
    F: Fn(&ErrorEvent) -> bool + Send + Sync + 'static,
{
    Arc::new(FnAction { f })
}

/// Map of kind to registered action
#[derive(Default)]
pub struct RecoveryRegistry {
    actions: HashMap<ErrorKind, Arc<dyn RecoveryAction>>,
}

impl RecoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `action` for `kind`, replacing any previous one
    pub fn register(&mut self, kind: ErrorKind, action: Arc<dyn RecoveryAction>) {
        if self.actions.insert(kind, action).is_some() {
            debug!("Replaced recovery action for {}", kind);
        }
    }

    pub fn unregister(&mut self, kind: ErrorKind) -> bool {
        self.actions.remove(&kind).is_some()
    }

    pub fn get(&self, kind: ErrorKind) -> Option<Arc<dyn RecoveryAction>> {
        self.actions.get(&kind).cloned()
    }

    pub fn is_registered(&self, kind: ErrorKind) -> bool {
        self.actions.contains_key(&kind)
    }

    pub fn registered_kinds(&self) -> Vec<ErrorKind> {
        let mut kinds: Vec<_> = self.actions.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

/// Run `action` for `event`, bounded by `timeout`.
///
/// The call runs in its own task so a panicking action surfaces as a join
/// error instead of unwinding through the caller. A missing action counts
/// as a failed recovery.
pub async fn invoke(
    action: Option<Arc<dyn RecoveryAction>>,
    event: &ErrorEvent,
    timeout: Duration,
) -> bool {
    let Some(action) = action else {
        warn!("No recovery action registered for {}", event.kind);
        return false;
    };

    let owned = event.clone();
    let mut task = tokio::spawn(async move { action.recover(&owned).await });

    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(Ok(recovered))) => recovered,
        Ok(Ok(Err(e))) => {
            warn!("Recovery action for {} failed: {:#}", event.kind, e);
            false
        }
        Ok(Err(join_err)) => {
            warn!("Recovery action for {} panicked: {}", event.kind, join_err);
            false
        }
        Err(_) => {
            task.abort();
            warn!(
                "Recovery action for {} timed out after {:?}",
                event.kind, timeout
            );
            false
        }
    }
}
