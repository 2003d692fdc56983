//! Domain models.

pub mod config;
pub mod run;

pub use config::{
    AgentHqConfig, CircuitBreakerSettings, Config, LoggingConfig, RetryConfig, WebhookConfig,
};
pub use run::{AgentRun, RunResult, RunStatus};
