//! Retry policy with exponential backoff for agent-run requests.
//!
//! Backoff delay grows geometrically with each retry and is capped:
//! the delay before retry `k` (1-indexed) is
//! `min(initial_delay * backoff_factor^(k-1), max_delay)`.
//!
//! # Retry decision
//! - Always retried: timeouts and transport failures (unless disabled).
//! - Retried only when opted in: API error responses.
//! - Never retried: configuration errors and circuit-open rejections.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::errors::AgentApiError;
use crate::domain::models::RetryConfig;

/// Which error kinds the retrier re-attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryOn {
    /// Retry `Api { .. }` errors (remote completed but reported failure).
    pub api_errors: bool,
    /// Retry deadline-exceeded errors.
    pub timeouts: bool,
    /// Retry connection-level failures.
    pub transport: bool,
}

impl Default for RetryOn {
    fn default() -> Self {
        Self {
            api_errors: false,
            timeouts: true,
            transport: true,
        }
    }
}

/// Retry policy configuration for handling transient errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    max_retries: u32,
    /// Delay before the first retry.
    initial_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    backoff_factor: f64,
    /// Cap on the inter-attempt delay.
    max_delay: Duration,
    /// Error kinds that are re-attempted.
    retry_on: RetryOn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), 2.0, Duration::from_secs(60))
    }
}

impl RetryPolicy {
    /// Create a new retry policy.
    ///
    /// `backoff_factor` must be at least 1.0 so the delay never shrinks.
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        backoff_factor: f64,
        max_delay: Duration,
    ) -> Self {
        assert!(
            backoff_factor >= 1.0,
            "backoff_factor must be at least 1.0"
        );
        assert!(
            max_delay >= initial_delay,
            "max_delay must be >= initial_delay"
        );
        Self {
            max_retries,
            initial_delay,
            backoff_factor,
            max_delay,
            retry_on: RetryOn::default(),
        }
    }

    /// Build a policy from the loaded configuration.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            backoff_factor: config.backoff_factor.max(1.0),
            max_delay: Duration::from_millis(config.max_delay_ms.max(config.initial_delay_ms)),
            retry_on: RetryOn {
                api_errors: config.retry_on_api_errors,
                ..RetryOn::default()
            },
        }
    }

    /// Override which error kinds are retried.
    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    /// Maximum number of retries after the initial attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry `retry_index` (0-indexed): the wait before the
    /// first retry is exactly `initial_delay`.
    pub fn backoff_delay(&self, retry_index: u32) -> Duration {
        let factor = self.backoff_factor.powi(retry_index.min(i32::MAX as u32) as i32);
        let delay_ms = (self.initial_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }

    /// Whether the given error is in the configured retryable set.
    fn should_retry(&self, error: &AgentApiError) -> bool {
        match error {
            AgentApiError::Api { .. } => self.retry_on.api_errors,
            AgentApiError::Timeout { .. } => self.retry_on.timeouts,
            AgentApiError::Transport(_) => self.retry_on.transport,
            AgentApiError::Configuration(_) | AgentApiError::CircuitOpen { .. } => false,
        }
    }

    /// Execute an operation with exponential backoff retry logic.
    ///
    /// The operation runs at most `max_retries + 1` times. The sleep
    /// between attempts suspends only the calling future; concurrent
    /// unrelated operations proceed unaffected.
    ///
    /// A non-retryable failure, or a retryable failure once attempts are
    /// exhausted, propagates to the caller unchanged - it is never
    /// swallowed.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, AgentApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AgentApiError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(err) if self.should_retry(&err) && attempt < self.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "attempt failed with transient error, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if self.should_retry(&err) {
                        warn!(
                            attempts = attempt + 1,
                            error = %err,
                            "operation failed after exhausting retries"
                        );
                    } else {
                        debug!(error = %err, "permanent error, not retrying");
                    }
                    return Err(err);
                }
            }
        }
    }
}
