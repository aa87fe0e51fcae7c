//! Engine configuration model.
//!
//! Loaded through the figment chain in `infrastructure::config`; every
//! field has a serde default so partial YAML files and env overrides merge
//! cleanly.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub database: DatabaseConfig,
    pub monitor: MonitorConfig,
    pub notifications: NotificationConfig,
    pub logging: LoggingConfig,
}

/// Database settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite URL, e.g. `sqlite:.vigil/vigil.db` or `sqlite::memory:`.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:.vigil/vigil.db".to_string(),
        }
    }
}

/// Escalation monitor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sweep interval in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
        }
    }
}

/// Notification dispatch retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of: trace, debug, info, warn, error.
    pub level: String,
    /// One of: json, pretty.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
