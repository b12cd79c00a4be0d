use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid score_threshold: {0}. Must be greater than 0.0 and at most 1.0")]
    InvalidScoreThreshold(f64),

    #[error("Invalid min_message_len: {0}. Must be at least 1")]
    InvalidMinMessageLen(usize),

    #[error("Invalid max_suggestions: {0}. Must be at least 1")]
    InvalidMaxSuggestions(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid {0} timeout: 0. Must be at least 1 second")]
    InvalidTimeout(&'static str),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .redliner/config.yaml (project config, created by init)
    /// 3. .redliner/local.yaml (project local overrides, optional)
    /// 4. Environment variables (REDLINER_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".redliner/config.yaml"))
            .merge(Yaml::file(".redliner/local.yaml"))
            .merge(Env::prefixed("REDLINER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.matcher.score_threshold <= 0.0 || config.matcher.score_threshold > 1.0 {
            return Err(ConfigError::InvalidScoreThreshold(
                config.matcher.score_threshold,
            ));
        }

        if config.guardrail.min_message_len == 0 {
            return Err(ConfigError::InvalidMinMessageLen(
                config.guardrail.min_message_len,
            ));
        }

        if config.guardrail.max_suggestions == 0 {
            return Err(ConfigError::InvalidMaxSuggestions(
                config.guardrail.max_suggestions,
            ));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.providers.rewrite_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("rewrite"));
        }

        if config.providers.chat_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("chat"));
        }

        if config.providers.primary.model.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Primary provider model cannot be empty".to_string(),
            ));
        }

        if let Some(secondary) = &config.providers.secondary {
            if secondary.model.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "Secondary provider model cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
