//! Circuit breaker for calls to the agent service.
//!
//! The breaker halts calls to a repeatedly failing dependency: after
//! `failure_threshold` consecutive failures it opens and rejects calls
//! immediately for `recovery_timeout`, then admits a single probe call to
//! test recovery. A probe success closes the circuit; a probe failure
//! reopens it for another cooldown.
//!
//! One breaker instance guards one fault boundary. Construct it once at
//! startup and share it (`Arc`) across every call site that should trip
//! together.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::domain::errors::AgentApiError;
use crate::domain::models::CircuitBreakerSettings;

/// State of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls pass through.
    Closed,
    /// Failing; calls are rejected without invoking the operation.
    Open,
    /// Testing recovery; exactly one probe call is admitted.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Configuration for a circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before admitting a probe.
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Build from the loaded configuration.
    pub fn from_settings(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold.max(1),
            recovery_timeout: Duration::from_secs(settings.recovery_timeout_secs),
        }
    }
}

/// Serializable snapshot of breaker state, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failure count.
    pub failure_count: u32,
    /// Configured threshold.
    pub failure_threshold: u32,
    /// Configured cooldown, in seconds.
    pub recovery_timeout_secs: u64,
    /// Seconds since the last counted failure, if any.
    pub last_failure_age_secs: Option<u64>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    /// True while the single half-open probe call is in flight.
    probe_in_flight: bool,
}

/// Verdict of the admission check, decided under the lock.
enum Admission {
    Admitted { as_probe: bool },
    Rejected { retry_after: Duration },
}

/// Holds the half-open probe slot for the duration of the guarded call.
///
/// If the call future is dropped before an outcome is recorded (the
/// caller timed it out or a `select!` raced past it), `Drop` releases the
/// slot and reopens the circuit so later calls are not rejected forever.
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl ProbeGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.on_probe_abandoned();
        }
    }
}

/// Three-state guard around calls to an unreliable dependency.
///
/// State transitions are atomic with respect to concurrent callers: the
/// check-and-admit step and the outcome recording each hold the lock, but
/// the lock is never held across the awaited operation itself.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new breaker in the closed state.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Execute an operation with circuit breaker protection.
    ///
    /// When the circuit is open the operation is never invoked; the call
    /// fails fast with [`AgentApiError::CircuitOpen`] carrying the
    /// remaining cooldown. Only errors where
    /// [`AgentApiError::counts_against_breaker`] is true affect circuit
    /// state; others propagate without touching it.
    ///
    /// Dropping the returned future mid-call (a caller-side timeout or
    /// `select!`) is safe: if the dropped call held the half-open slot,
    /// the circuit reopens for a fresh cooldown instead of wedging.
    pub async fn call<Fut, T>(&self, operation: Fut) -> Result<T, AgentApiError>
    where
        Fut: std::future::Future<Output = Result<T, AgentApiError>>,
    {
        let mut probe = match self.admit() {
            Admission::Rejected { retry_after } => {
                warn!(
                    retry_after_secs = retry_after.as_secs(),
                    "circuit open, rejecting call"
                );
                return Err(AgentApiError::CircuitOpen {
                    retry_after_secs: retry_after.as_secs(),
                });
            }
            Admission::Admitted { as_probe } => as_probe.then(|| ProbeGuard {
                breaker: self,
                armed: true,
            }),
        };

        match operation.await {
            Ok(result) => {
                if let Some(guard) = probe.as_mut() {
                    guard.disarm();
                }
                self.on_success();
                Ok(result)
            }
            Err(err) => {
                if let Some(guard) = probe.as_mut() {
                    guard.disarm();
                }
                self.on_failure(&err);
                Err(err)
            }
        }
    }

    /// Decide whether a call may proceed, transitioning open -> half-open
    /// once the cooldown has elapsed. The call that triggers the timeout
    /// check is itself admitted as the probe.
    fn admit(&self) -> Admission {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match inner.state {
            CircuitState::Closed => Admission::Admitted { as_probe: false },
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_time
                    .map_or(Duration::ZERO, |t| t.elapsed());
                if elapsed >= self.config.recovery_timeout {
                    info!("circuit entering half-open state");
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    Admission::Admitted { as_probe: true }
                } else {
                    Admission::Rejected {
                        retry_after: self.config.recovery_timeout - elapsed,
                    }
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    // One probe at a time; everyone else keeps failing fast.
                    Admission::Rejected {
                        retry_after: self.remaining_cooldown(&inner),
                    }
                } else {
                    inner.probe_in_flight = true;
                    Admission::Admitted { as_probe: true }
                }
            }
        }
    }

    /// Called when a probe call was dropped before it produced an outcome.
    /// The slot is released and the circuit reopens for a fresh cooldown:
    /// the dependency never answered, which is not evidence of recovery.
    fn on_probe_abandoned(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.state == CircuitState::HalfOpen && inner.probe_in_flight {
            warn!("half-open call abandoned before completing, circuit reopening");
            inner.probe_in_flight = false;
            inner.state = CircuitState::Open;
            inner.last_failure_time = Some(Instant::now());
        }
    }

    fn remaining_cooldown(&self, inner: &BreakerInner) -> Duration {
        inner.last_failure_time.map_or(Duration::ZERO, |t| {
            self.config.recovery_timeout.saturating_sub(t.elapsed())
        })
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.state == CircuitState::HalfOpen {
            info!("circuit closed - service recovered");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.probe_in_flight = false;
    }

    fn on_failure(&self, err: &AgentApiError) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        if !err.counts_against_breaker() {
            // Not the dependency's fault; release a probe slot if we held one.
            inner.probe_in_flight = false;
            return;
        }

        inner.failure_count += 1;
        inner.last_failure_time = Some(Instant::now());

        match inner.state {
            CircuitState::HalfOpen => {
                warn!(
                    failure_count = inner.failure_count,
                    "probe failed, circuit reopening"
                );
                inner.state = CircuitState::Open;
            }
            CircuitState::Closed if inner.failure_count >= self.config.failure_threshold => {
                warn!(
                    failure_count = inner.failure_count,
                    recovery_timeout_secs = self.config.recovery_timeout.as_secs(),
                    "failure threshold reached, circuit opening"
                );
                inner.state = CircuitState::Open;
            }
            _ => {}
        }
        inner.probe_in_flight = false;
    }

    /// Manually reset the breaker to closed, clearing all failure history.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        info!("circuit breaker manually reset");
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.last_failure_time = None;
        inner.probe_in_flight = false;
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .state
    }

    /// Current consecutive failure count.
    pub fn failure_count(&self) -> u32 {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .failure_count
    }

    /// Detailed status snapshot.
    pub fn status(&self) -> BreakerStatus {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        BreakerStatus {
            state: inner.state,
            failure_count: inner.failure_count,
            failure_threshold: self.config.failure_threshold,
            recovery_timeout_secs: self.config.recovery_timeout.as_secs(),
            last_failure_age_secs: inner.last_failure_time.map(|t| t.elapsed().as_secs()),
        }
    }
}
