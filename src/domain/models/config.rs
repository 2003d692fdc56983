//! Configuration model for the bridge.

use serde::{Deserialize, Serialize};

/// Main configuration structure for fixbridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// AgentHQ service configuration
    #[serde(default)]
    pub agenthq: AgentHqConfig,

    /// Retry policy configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Circuit breaker configuration
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,

    /// Completion webhook configuration
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// AgentHQ service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentHqConfig {
    /// API key; required unless `mock_mode` is set
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the agent service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Agent to dispatch runs to; required unless `mock_mode` is set
    #[serde(default)]
    pub agent_id: Option<String>,

    /// Callback URL passed to the service for run creation
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Serve runs from the in-process simulator instead of the real API
    #[serde(default = "default_mock_mode")]
    pub mock_mode: bool,

    /// Per-request deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.agenthq.dev".to_string()
}

const fn default_mock_mode() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    30
}

impl Default for AgentHqConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            agent_id: None,
            webhook_url: None,
            mock_mode: default_mock_mode(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Multiplier applied to the delay after each retry
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Cap on the delay between retries, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Whether API error responses are retried in addition to timeouts
    /// and transport failures
    #[serde(default)]
    pub retry_on_api_errors: bool,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_backoff_factor() -> f64 {
    2.0
}

const fn default_initial_delay_ms() -> u64 {
    1000
}

const fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_factor: default_backoff_factor(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            retry_on_api_errors: false,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CircuitBreakerSettings {
    /// Consecutive failures before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before admitting a probe call
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_recovery_timeout_secs() -> u64 {
    60
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
        }
    }
}

/// Completion webhook configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WebhookConfig {
    /// Destination for completion callbacks; delivery is skipped when unset
    #[serde(default)]
    pub completion_url: Option<String>,

    /// Delivery timeout in seconds
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_webhook_timeout_secs() -> u64 {
    10
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            completion_url: None,
            timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
