//! Shell command recovery actions, configured under `[actions]`

use crate::registry::RecoveryAction;
use anyhow::Context;
use async_trait::async_trait;
use faultline_common::ErrorEvent;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs `sh -c <command>`; exit status 0 means recovered.
///
/// The event is passed through the environment as `FAULTLINE_KIND`,
/// `FAULTLINE_MESSAGE` and `FAULTLINE_CONTEXT`.
#[derive(Debug, Clone)]
pub struct CommandAction {
    command: String,
}

impl CommandAction {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl RecoveryAction for CommandAction {
    async fn recover(&self, event: &ErrorEvent) -> anyhow::Result<bool> {
        debug!("Running recovery command for {}: {}", event.kind, self.command);

        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("FAULTLINE_KIND", event.kind.as_str())
            .env("FAULTLINE_MESSAGE", &event.message)
            .env("FAULTLINE_CONTEXT", &event.context)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to spawn `{}`", self.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                "Recovery command for {} exited with {}: {}",
                event.kind,
                output.status,
                stderr.trim()
            );
        }
        Ok(output.status.success())
    }
}
