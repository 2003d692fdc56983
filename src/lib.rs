//! Fixbridge - Resilient remote-task execution for ticket-fix agents
//!
//! Fixbridge dispatches ticket-fix work to the AgentHQ agent service and
//! keeps that dependency survivable: every remote call goes through an
//! exponential-backoff retrier and a circuit breaker, and a built-in run
//! simulator serves the same API contract in-process so the bridge works
//! end to end without credentials.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Run lifecycle models, error taxonomy, configuration
//! - **Service Layer** (`services`): Retry, circuit breaker, simulator, webhook notifier
//! - **Adapter Layer** (`adapters`): AgentHQ HTTP client and wire types
//! - **Application Layer** (`application`): The guarded client composing the stack
//! - **Infrastructure Layer** (`infrastructure`): Configuration loading
//!
//! # Example
//!
//! ```ignore
//! use fixbridge::application::GuardedAgentClient;
//! use fixbridge::infrastructure::config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let client = GuardedAgentClient::from_config(&config)?;
//!     // create runs, poll status, cancel
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::agenthq::{
    AgentHqClient, AgentRunInput, AgentRunRequest, CreateRunResponse, RunStatusResponse,
};
pub use application::GuardedAgentClient;
pub use domain::errors::{AgentApiError, RemoteResult};
pub use domain::models::{
    AgentHqConfig, AgentRun, CircuitBreakerSettings, Config, LoggingConfig, RetryConfig,
    RunResult, RunStatus, WebhookConfig,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, CompletionNotifier, RetryOn, RetryPolicy,
    RunSimulator, SimStep,
};
