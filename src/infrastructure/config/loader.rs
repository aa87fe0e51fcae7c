use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::VigilConfig;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database URL cannot be empty")]
    EmptyDatabaseUrl,

    #[error("Invalid tick interval: {0}. Must be at least 10ms")]
    InvalidTickInterval(u64),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .vigil/config.yaml (project config)
    /// 3. .vigil/local.yaml (local overrides, optional)
    /// 4. Environment variables (VIGIL_* prefix, highest priority)
    pub fn load() -> Result<VigilConfig> {
        let config: VigilConfig = Figment::new()
            .merge(Serialized::defaults(VigilConfig::default()))
            .merge(Yaml::file(".vigil/config.yaml"))
            .merge(Yaml::file(".vigil/local.yaml"))
            .merge(Env::prefixed("VIGIL_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<VigilConfig> {
        let config: VigilConfig = Figment::new()
            .merge(Serialized::defaults(VigilConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &VigilConfig) -> Result<(), ConfigError> {
        if config.database.url.trim().is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }
        if config.monitor.tick_interval_ms < 10 {
            return Err(ConfigError::InvalidTickInterval(
                config.monitor.tick_interval_ms,
            ));
        }
        if config.notifications.initial_backoff_ms >= config.notifications.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.notifications.initial_backoff_ms,
                config.notifications.max_backoff_ms,
            ));
        }
        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
        match config.logging.format.as_str() {
            "json" | "pretty" => {}
            other => return Err(ConfigError::InvalidLogFormat(other.to_string())),
        }
        Ok(())
    }
}
