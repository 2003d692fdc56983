//! Resilient facade over the agent service client.
//!
//! Wraps every remote call in the full protection stack: the circuit
//! breaker is the outer guard, so an open circuit rejects calls before
//! any retry attempt runs; the retrier sits inside and absorbs transient
//! failures. One completed retry cycle therefore counts as at most one
//! failure against the breaker.

use std::sync::Arc;
use std::time::Duration;

use crate::adapters::agenthq::{
    AgentHqClient, AgentRunInput, CreateRunResponse, RunStatusResponse,
};
use crate::domain::errors::RemoteResult;
use crate::domain::models::Config;
use crate::services::circuit_breaker::{BreakerStatus, CircuitBreaker, CircuitBreakerConfig};
use crate::services::notifier::CompletionNotifier;
use crate::services::retry::{RetryOn, RetryPolicy};
use crate::services::simulator::RunSimulator;

/// Agent service client with retry and circuit-breaker protection.
pub struct GuardedAgentClient {
    client: AgentHqClient,
    retry: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
}

impl GuardedAgentClient {
    /// Build the full stack from application configuration.
    ///
    /// Mock mode attaches an in-process simulator; otherwise calls go to
    /// the real service. Fails only when an HTTP client cannot be
    /// constructed.
    pub fn from_config(config: &Config) -> RemoteResult<Self> {
        let client = if config.agenthq.mock_mode {
            let mut simulator = RunSimulator::new();
            if config.webhook.completion_url.is_some() {
                let notifier = CompletionNotifier::new(
                    config.webhook.completion_url.clone(),
                    Duration::from_secs(config.webhook.timeout_secs),
                )?;
                simulator = simulator.with_notifier(Arc::new(notifier));
            }
            AgentHqClient::simulated(config.agenthq.clone(), Arc::new(simulator))?
        } else {
            AgentHqClient::new(config.agenthq.clone())?
        };
        let retry = RetryPolicy::from_config(&config.retry);
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::from_settings(
            &config.circuit_breaker,
        )));
        Ok(Self {
            client,
            retry,
            breaker,
        })
    }

    /// Assemble the stack from pre-built parts.
    pub fn new(client: AgentHqClient, retry: RetryPolicy, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            client,
            retry,
            breaker,
        }
    }

    /// Replace the retryable-error selection.
    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry = self.retry.with_retry_on(retry_on);
        self
    }

    /// Shared handle to the breaker, for health reporting and manual reset.
    pub fn breaker(&self) -> Arc<CircuitBreaker> {
        Arc::clone(&self.breaker)
    }

    /// Snapshot of the breaker for health endpoints.
    pub fn breaker_status(&self) -> BreakerStatus {
        self.breaker.status()
    }

    /// Start an agent run, retrying transient failures.
    pub async fn create_run(&self, input: AgentRunInput) -> RemoteResult<CreateRunResponse> {
        self.breaker
            .call(self.retry.execute(|| self.client.create_run(input.clone())))
            .await
    }

    /// Poll run status, retrying transient failures.
    ///
    /// A 404 for an unknown run is not retried; it surfaces immediately.
    pub async fn run_status(&self, run_id: &str) -> RemoteResult<RunStatusResponse> {
        self.breaker
            .call(self.retry.execute(|| self.client.run_status(run_id)))
            .await
    }

    /// Request cancellation of a run.
    ///
    /// Cancellation is best effort and bypasses the protection stack: it
    /// never errors, so there is nothing to retry or count.
    pub async fn cancel_run(&self, run_id: &str) -> bool {
        self.client.cancel_run(run_id).await
    }
}
