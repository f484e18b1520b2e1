//! Configuration management for faultline.
//!
//! Loads settings from /etc/faultline/config.toml or uses defaults.
//! The camelCase option names of the embedding API are accepted as aliases.

use crate::error::ConfigError;
use crate::kind::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// System config file path
pub const CONFIG_PATH: &str = "/etc/faultline/config.toml";

/// Engine behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Log every accepted report at info level, with context
    #[serde(default = "default_true", alias = "enableDetailedLogging")]
    pub enable_detailed_logging: bool,

    /// Emit user-facing messages for warnings and above
    #[serde(default = "default_true", alias = "showUserFriendlyMessages")]
    pub show_user_friendly_messages: bool,

    /// Minimum seconds between two admitted reports of one kind
    #[serde(default = "default_cooldown", alias = "errorCooldownTime")]
    pub error_cooldown_secs: f64,

    /// Ledger capacity
    #[serde(default = "default_history_size", alias = "maxErrorHistorySize")]
    pub max_error_history_size: usize,

    #[serde(default = "default_true", alias = "enableAutoRecovery")]
    pub enable_auto_recovery: bool,

    /// Attempts per kind before an occurrence is declared unrecoverable
    #[serde(default = "default_max_attempts", alias = "maxRecoveryAttempts")]
    pub max_recovery_attempts: u32,

    /// Base delay before the first attempt; doubles on every retry
    #[serde(default = "default_recovery_delay", alias = "recoveryDelaySeconds")]
    pub recovery_delay_secs: f64,

    /// Upper bound on a single recovery action call
    #[serde(default = "default_recovery_timeout", alias = "recoveryTimeoutSeconds")]
    pub recovery_timeout_secs: f64,
}

fn default_true() -> bool {
    true
}

fn default_cooldown() -> f64 {
    2.0
}

fn default_history_size() -> usize {
    100
}

fn default_max_attempts() -> u32 {
    3
}

fn default_recovery_delay() -> f64 {
    1.0
}

fn default_recovery_timeout() -> f64 {
    5.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_detailed_logging: default_true(),
            show_user_friendly_messages: default_true(),
            error_cooldown_secs: default_cooldown(),
            max_error_history_size: default_history_size(),
            enable_auto_recovery: default_true(),
            max_recovery_attempts: default_max_attempts(),
            recovery_delay_secs: default_recovery_delay(),
            recovery_timeout_secs: default_recovery_timeout(),
        }
    }
}

impl EngineConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.error_cooldown_secs)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_secs_f64(self.recovery_delay_secs)
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.recovery_timeout_secs)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_secs("error_cooldown_secs", self.error_cooldown_secs)?;
        check_secs("recovery_delay_secs", self.recovery_delay_secs)?;
        check_secs("recovery_timeout_secs", self.recovery_timeout_secs)?;

        if self.recovery_timeout_secs == 0.0 {
            return Err(ConfigError::invalid(
                "recovery_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.max_error_history_size == 0 {
            return Err(ConfigError::invalid(
                "max_error_history_size",
                "must hold at least one record",
            ));
        }
        Ok(())
    }
}

fn check_secs(field: &'static str, value: f64) -> Result<(), ConfigError> {
    // Duration::from_secs_f64 overflows well above a day; cap far below that
    if !value.is_finite() || value < 0.0 || value > 86_400.0 {
        return Err(ConfigError::invalid(
            field,
            format!("{} is not a duration in seconds between 0 and 86400", value),
        ));
    }
    Ok(())
}

/// Log output settings for the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; RUST_LOG overrides it
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Shell command run as the recovery action for a kind (daemon only)
    #[serde(default)]
    pub actions: BTreeMap<ErrorKind, String>,
}

impl Config {
    /// Load config from `path` if given, then the system path, else defaults
    pub fn load(path: Option<&Path>) -> Self {
        let system = Path::new(CONFIG_PATH);
        match path {
            Some(p) if p != system => Self::load_first(&[p, system]),
            _ => Self::load_first(&[system]),
        }
    }

    /// Load from the first candidate that parses and validates, else defaults
    pub fn load_first(candidates: &[&Path]) -> Self {
        for path in candidates {
            match Self::load_from_path(path) {
                Ok(config) => return config,
                Err(e) => warn!("Config not loaded: {}", e),
            }
        }
        warn!("No usable config found, using defaults");
        Config::default()
    }

    /// Load and validate config from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let path_str = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path_str.clone(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path_str.clone(),
            source,
        })?;
        config.engine.validate()?;
        info!("Loaded config from {}", path_str);
        Ok(config)
    }

    /// Save default config to path (for init)
    pub fn save_default(path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(&Config::default())?;
        let io_err = |source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, content).map_err(io_err)?;
        info!("Saved default config to {}", path.display());
        Ok(())
    }
}
