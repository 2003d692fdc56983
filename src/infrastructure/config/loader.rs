use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid backoff_factor: {0}. Must be at least 1.0")]
    InvalidBackoffFactor(f64),

    #[error(
        "Invalid delay configuration: initial_delay_ms ({0}) must not exceed max_delay_ms ({1})"
    )]
    InvalidDelays(u64, u64),

    #[error("Invalid failure_threshold: {0}. Must be at least 1")]
    InvalidFailureThreshold(u32),

    #[error("Invalid recovery_timeout_secs: {0}. Must be at least 1")]
    InvalidRecoveryTimeout(u64),

    #[error("AgentHQ base_url cannot be empty")]
    EmptyBaseUrl,

    #[error("Invalid timeout_secs: {0}. Must be at least 1")]
    InvalidTimeout(u64),

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
    /// 2. .fixbridge/config.yaml (project config)
    /// 3. .fixbridge/local.yaml (project local overrides, optional)
    /// 4. Environment variables (FIXBRIDGE_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".fixbridge/config.yaml"))
            .merge(Yaml::file(".fixbridge/local.yaml"))
            .merge(Env::prefixed("FIXBRIDGE_").split("__"))
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
        // Validate agenthq config
        if config.agenthq.base_url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }

        if config.agenthq.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(config.agenthq.timeout_secs));
        }

        // Real mode needs credentials; mock mode needs none
        if !config.agenthq.mock_mode {
            if config.agenthq.api_key.is_none() {
                return Err(ConfigError::ValidationFailed(
                    "agenthq.api_key is required when mock_mode is false".to_string(),
                ));
            }
            if config.agenthq.agent_id.is_none() {
                return Err(ConfigError::ValidationFailed(
                    "agenthq.agent_id is required when mock_mode is false".to_string(),
                ));
            }
        }

        // Validate retry config
        if config.retry.backoff_factor < 1.0 {
            return Err(ConfigError::InvalidBackoffFactor(
                config.retry.backoff_factor,
            ));
        }

        if config.retry.initial_delay_ms > config.retry.max_delay_ms {
            return Err(ConfigError::InvalidDelays(
                config.retry.initial_delay_ms,
                config.retry.max_delay_ms,
            ));
        }

        // Validate circuit breaker config
        if config.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold(
                config.circuit_breaker.failure_threshold,
            ));
        }

        if config.circuit_breaker.recovery_timeout_secs == 0 {
            return Err(ConfigError::InvalidRecoveryTimeout(
                config.circuit_breaker.recovery_timeout_secs,
            ));
        }

        // Validate webhook config
        if config.webhook.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(config.webhook.timeout_secs));
        }

        // Validate logging config
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
