//! Error taxonomy for remote agent-run operations.
//!
//! Every failure from the client, the retrier, and the circuit breaker is
//! expressed as an [`AgentApiError`], so callers can distinguish "remote
//! rejected the request" from "remote unreachable" from "circuit currently
//! open" without string matching.

use thiserror::Error;

/// Errors raised by agent-run operations and the resilience layer.
#[derive(Debug, Clone, Error)]
pub enum AgentApiError {
    /// A required setting is missing for the requested operating mode.
    /// Fatal to the specific operation; never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The remote call completed but the service reported a failure status.
    #[error("AgentHQ API error {code}: {message}")]
    Api {
        /// HTTP status code returned by the service.
        code: u16,
        /// Error message extracted from the response body.
        message: String,
    },

    /// The call exceeded the configured deadline without completing.
    #[error("Request to AgentHQ timed out after {seconds}s")]
    Timeout {
        /// The deadline that was exceeded, in seconds.
        seconds: u64,
    },

    /// Connection-level failure before any response was received.
    #[error("Failed to reach AgentHQ: {0}")]
    Transport(String),

    /// Synthetic error raised by the circuit breaker when it rejects a
    /// call without invoking the wrapped operation.
    #[error("Circuit breaker is open - service unavailable. Retry in {retry_after_secs}s")]
    CircuitOpen {
        /// Remaining cooldown before the breaker will admit a probe call.
        retry_after_secs: u64,
    },
}

impl AgentApiError {
    /// Whether this error reflects the remote service misbehaving and
    /// should count against the circuit breaker.
    ///
    /// `Configuration` is a local problem and `CircuitOpen` is produced by
    /// the breaker itself; neither affects circuit state.
    pub fn counts_against_breaker(&self) -> bool {
        matches!(
            self,
            Self::Api { .. } | Self::Timeout { .. } | Self::Transport(_)
        )
    }

    /// Whether this error is transient in the HTTP sense: rate limiting,
    /// server errors, timeouts, and connection failures.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { code, .. } => *code == 429 || *code >= 500,
            Self::Timeout { .. } | Self::Transport(_) => true,
            Self::Configuration(_) | Self::CircuitOpen { .. } => false,
        }
    }

    /// Shorthand for an API error with a 404 code.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Api {
            code: 404,
            message: message.into(),
        }
    }
}

/// Result alias used by agent-run operations.
pub type RemoteResult<T> = Result<T, AgentApiError>;
