//! Resilience and lifecycle services.

pub mod circuit_breaker;
pub mod notifier;
pub mod retry;
pub mod simulator;

pub use circuit_breaker::{BreakerStatus, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use notifier::{CompletionNotifier, CompletionPayload};
pub use retry::{RetryOn, RetryPolicy};
pub use simulator::{default_steps, RunSimulator, SimStep};
