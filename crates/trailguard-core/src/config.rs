use crate::catalog::Action;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// AWS managed policy denying every action.
pub const DEFAULT_DENY_POLICY_ARN: &str = "arn:aws:iam::aws:policy/AWSDenyAll";

/// Event source emitted by CloudTrail's own control plane.
pub const CLOUDTRAIL_EVENT_SOURCE: &str = "cloudtrail.amazonaws.com";

/// Error while loading or validating a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level controller configuration. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where notifications are published.
    pub notification: NotificationConfig,
    /// Identity lockdown settings.
    #[serde(default)]
    pub lockdown: LockdownConfig,
    /// Event name to action mapping.
    #[serde(default)]
    pub classification: ClassificationConfig,
    /// Bounds on external calls.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// AWS client settings.
    #[serde(default)]
    pub aws: AwsConfig,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads and validates a config file from TOML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parses and validates config from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a config with defaults for everything but the notification target.
    pub fn with_target(target_arn: impl Into<String>) -> Self {
        Self {
            notification: NotificationConfig {
                target_arn: target_arn.into(),
            },
            lockdown: LockdownConfig::default(),
            classification: ClassificationConfig::default(),
            timeouts: TimeoutConfig::default(),
            aws: AwsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notification.target_arn.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "notification.target_arn must not be empty".to_string(),
            ));
        }
        if self.lockdown.deny_policy_arn.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "lockdown.deny_policy_arn must not be empty".to_string(),
            ));
        }
        if self.timeouts.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeouts.call_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(name) = self.classification.actions.keys().find(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "classification.actions contains an empty event name: {name:?}"
            )));
        }
        Ok(())
    }
}

/// Notification target configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Topic ARN (or sink identifier) receiving every notification.
    pub target_arn: String,
}

/// Identity lockdown configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockdownConfig {
    /// Explicit deny-all policy attached to the offending identity.
    #[serde(default = "default_deny_policy_arn")]
    pub deny_policy_arn: String,
}

impl Default for LockdownConfig {
    fn default() -> Self {
        Self {
            deny_policy_arn: default_deny_policy_arn(),
        }
    }
}

/// Classification table configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Seed the table with the built-in trail-management events.
    #[serde(default = "default_true")]
    pub curated: bool,
    /// Per-event overrides and additions.
    #[serde(default)]
    pub actions: BTreeMap<String, Action>,
    /// Event sources eligible for remediation. Empty (the default) allows
    /// any source.
    #[serde(default)]
    pub event_sources: Vec<String>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            curated: true,
            actions: BTreeMap::new(),
            event_sources: Vec::new(),
        }
    }
}

/// Timeout applied to every external call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl TimeoutConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

/// AWS client settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Region override; the SDK default chain is used when unset.
    pub region: Option<String>,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_true() -> bool {
    true
}

fn default_deny_policy_arn() -> String {
    DEFAULT_DENY_POLICY_ARN.to_string()
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}
