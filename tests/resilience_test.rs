//! Resilience Integration Tests
//!
//! Exercises the retry policy and circuit breaker together, the way the
//! guarded client composes them: the breaker guards the outside, a full
//! retry cycle runs inside it and counts as a single breaker outcome.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use fixbridge::domain::errors::AgentApiError;
use fixbridge::services::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use fixbridge::services::retry::{RetryOn, RetryPolicy};

fn transport_error() -> AgentApiError {
    AgentApiError::Transport("connection refused".to_string())
}

fn breaker(threshold: u32, recovery_secs: u64) -> CircuitBreaker {
    CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: threshold,
        recovery_timeout: Duration::from_secs(recovery_secs),
    })
}

/// The retrier makes max_retries + 1 attempts before surfacing the last
/// error, sleeping the backoff schedule between attempts.
#[tokio::test(start_paused = true)]
async fn retry_exhaustion_surfaces_last_error() {
    let policy = RetryPolicy::new(3, Duration::from_millis(100), 2.0, Duration::from_secs(60));
    let attempts = AtomicU32::new(0);

    let started = tokio::time::Instant::now();
    let result: Result<(), _> = policy
        .execute(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(transport_error())
        })
        .await;

    assert!(matches!(result.unwrap_err(), AgentApiError::Transport(_)));
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    // 100ms + 200ms + 400ms of backoff under the paused clock.
    assert_eq!(started.elapsed(), Duration::from_millis(700));
}

/// A success mid-cycle stops retrying immediately.
#[tokio::test(start_paused = true)]
async fn retry_stops_on_first_success() {
    let policy = RetryPolicy::new(5, Duration::from_millis(100), 2.0, Duration::from_secs(60));
    let attempts = AtomicU32::new(0);

    let result = policy
        .execute(|| async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(transport_error())
            } else {
                Ok("created")
            }
        })
        .await;

    assert_eq!(result.unwrap(), "created");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

/// API errors are not retried by default but can be opted in.
#[tokio::test(start_paused = true)]
async fn api_errors_retry_only_when_opted_in() {
    let api_error = || AgentApiError::Api {
        code: 503,
        message: "service unavailable".to_string(),
    };

    let policy = RetryPolicy::new(3, Duration::from_millis(10), 2.0, Duration::from_secs(1));
    let attempts = AtomicU32::new(0);
    let result: Result<(), _> = policy
        .execute(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(api_error())
        })
        .await;
    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1, "no retry by default");

    let policy = policy.with_retry_on(RetryOn {
        api_errors: true,
        ..RetryOn::default()
    });
    attempts.store(0, Ordering::SeqCst);
    let result: Result<(), _> = policy
        .execute(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(api_error())
        })
        .await;
    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 4, "retried when opted in");
}

/// After the threshold is reached calls are rejected without invoking
/// the wrapped operation, and the rejection names the remaining cooldown.
#[tokio::test(start_paused = true)]
async fn open_breaker_rejects_without_invoking() {
    let breaker = breaker(5, 60);
    let invoked = AtomicU32::new(0);

    for _ in 0..5 {
        let _ = breaker
            .call(async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(transport_error())
            })
            .await;
    }
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(invoked.load(Ordering::SeqCst), 5);

    let err = breaker
        .call(async {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AgentApiError>(())
        })
        .await
        .unwrap_err();
    match err {
        AgentApiError::CircuitOpen { retry_after_secs } => {
            assert!(retry_after_secs <= 60);
        }
        other => panic!("Expected CircuitOpen, got {other:?}"),
    }
    assert_eq!(invoked.load(Ordering::SeqCst), 5, "rejected call never ran");
}

/// One full retry cycle counts as a single failure against the breaker.
#[tokio::test(start_paused = true)]
async fn retry_cycle_is_one_breaker_failure() {
    let policy = RetryPolicy::new(3, Duration::from_millis(10), 2.0, Duration::from_secs(1));
    let breaker = breaker(5, 60);

    let result: Result<(), _> = breaker
        .call(policy.execute(|| async { Err(transport_error()) }))
        .await;
    assert!(result.is_err());
    assert_eq!(breaker.failure_count(), 1);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

/// After the cooldown the breaker admits one probe; a success closes the
/// circuit and clears the count.
#[tokio::test(start_paused = true)]
async fn breaker_recovers_through_half_open_probe() {
    let breaker = breaker(2, 30);

    for _ in 0..2 {
        let _ = breaker
            .call(async { Err::<(), _>(transport_error()) })
            .await;
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(31)).await;

    let result = breaker.call(async { Ok::<_, AgentApiError>("ok") }).await;
    assert_eq!(result.unwrap(), "ok");
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

/// A failed probe reopens the circuit for a fresh cooldown.
#[tokio::test(start_paused = true)]
async fn failed_probe_reopens_breaker() {
    let breaker = breaker(2, 30);

    for _ in 0..2 {
        let _ = breaker
            .call(async { Err::<(), _>(transport_error()) })
            .await;
    }
    tokio::time::advance(Duration::from_secs(31)).await;

    let _ = breaker
        .call(async { Err::<(), _>(transport_error()) })
        .await;
    assert_eq!(breaker.state(), CircuitState::Open);

    // Still rejecting before a fresh cooldown elapses.
    let err = breaker
        .call(async { Ok::<_, AgentApiError>(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, AgentApiError::CircuitOpen { .. }));
}

/// Configuration errors pass through the breaker without counting.
#[tokio::test(start_paused = true)]
async fn configuration_errors_do_not_count() {
    let breaker = breaker(2, 30);

    for _ in 0..5 {
        let err = breaker
            .call(async {
                Err::<(), _>(AgentApiError::Configuration("api_key missing".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AgentApiError::Configuration(_)));
    }
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

/// Manual reset returns an open breaker to closed immediately.
#[tokio::test(start_paused = true)]
async fn manual_reset_closes_breaker() {
    let breaker = breaker(1, 300);

    let _ = breaker
        .call(async { Err::<(), _>(transport_error()) })
        .await;
    assert_eq!(breaker.state(), CircuitState::Open);

    breaker.reset();
    assert_eq!(breaker.state(), CircuitState::Closed);

    let result = breaker.call(async { Ok::<_, AgentApiError>(()) }).await;
    assert!(result.is_ok());
}
