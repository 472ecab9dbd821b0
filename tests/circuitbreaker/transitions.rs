use safeguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use safeguard_core::ErrorKind;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn breaker(failure_threshold: u32, half_open_trial_limit: u32) -> CircuitBreaker {
    CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("db")
            .failure_threshold(failure_threshold)
            .recovery_timeout(Duration::from_secs(60))
            .half_open_trial_limit(half_open_trial_limit)
            .build()
            .unwrap(),
    )
}

fn trip(breaker: &CircuitBreaker, failures: u32) {
    for _ in 0..failures {
        let permit = breaker.try_acquire().unwrap();
        permit.record_failure(ErrorKind::ServiceUnavailable);
    }
}

#[tokio::test(start_paused = true)]
async fn next_call_after_threshold_never_reaches_the_operation() {
    let breaker = breaker(5, 1);
    let calls = AtomicU32::new(0);

    for _ in 0..5 {
        let result = breaker
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ErrorKind::ServiceUnavailable)
            })
            .await;
        assert!(!result.unwrap_err().is_circuit_open());
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let result = breaker
        .call(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ErrorKind>(())
        })
        .await;
    assert!(result.unwrap_err().is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(breaker.metrics().rejected_count, 1);
}

#[tokio::test(start_paused = true)]
async fn rejects_until_recovery_timeout_then_admits_trial_limit_probes() {
    let breaker = breaker(5, 2);
    trip(&breaker, 5);
    assert!(breaker.is_open());

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(breaker.try_acquire().is_err());
    assert_eq!(breaker.remaining_open(), Some(Duration::from_secs(1)));

    tokio::time::advance(Duration::from_secs(1)).await;
    let first = breaker.try_acquire().unwrap();
    let second = breaker.try_acquire().unwrap();
    assert!(first.is_probe() && second.is_probe());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    // A third concurrent caller would stampede the recovering dependency.
    assert!(breaker.try_acquire().is_err());

    first.record_success();
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    second.record_success();
    assert_eq!(breaker.state(), CircuitState::Closed);

    let metrics = breaker.metrics();
    assert_eq!(metrics.failure_count, 0);
    assert_eq!(metrics.consecutive_half_open_successes, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_probe_reopens_and_restarts_the_timeout() {
    let breaker = breaker(1, 1);
    trip(&breaker, 1);

    tokio::time::advance(Duration::from_secs(60)).await;
    let probe = breaker.try_acquire().unwrap();
    probe.record_failure(ErrorKind::Timeout);
    drop(probe);
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(breaker.try_acquire().is_err());
    assert_eq!(breaker.remaining_open(), Some(Duration::from_secs(30)));
}

#[tokio::test(start_paused = true)]
async fn dropped_probe_frees_its_slot() {
    let breaker = breaker(1, 1);
    trip(&breaker, 1);
    tokio::time::advance(Duration::from_secs(60)).await;

    let abandoned = breaker.try_acquire().unwrap();
    assert!(breaker.try_acquire().is_err());
    drop(abandoned);

    let probe = breaker.try_acquire().unwrap();
    probe.record_success();
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn caller_faults_never_trip() {
    let breaker = breaker(2, 1);

    for kind in [
        ErrorKind::ValidationFailure,
        ErrorKind::PermissionDenied,
        ErrorKind::NotFound,
        ErrorKind::ValidationFailure,
    ] {
        let _ = breaker.call(|| async move { Err::<(), _>(kind) }).await;
    }

    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.metrics().failure_count, 0);
    assert_eq!(breaker.metrics().total_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn failures_outside_the_window_are_forgotten() {
    let breaker = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("cache")
            .failure_threshold(3)
            .failure_window(Duration::from_secs(60))
            .build()
            .unwrap(),
    );

    trip(&breaker, 2);
    tokio::time::advance(Duration::from_secs(61)).await;
    trip(&breaker, 1);
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.metrics().failure_count, 1);

    trip(&breaker, 2);
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn success_resets_the_failure_count() {
    let breaker = breaker(3, 1);
    trip(&breaker, 2);
    assert_eq!(breaker.metrics().failure_count, 2);

    breaker.try_acquire().unwrap().record_success();
    assert_eq!(breaker.metrics().failure_count, 0);

    trip(&breaker, 2);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn every_transition_is_observable() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let breaker = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("smtp")
            .failure_threshold(1)
            .recovery_timeout(Duration::from_secs(10))
            .on_state_transition(move |from, to| sink.lock().unwrap().push((from, to)))
            .build()
            .unwrap(),
    );

    trip(&breaker, 1);
    tokio::time::advance(Duration::from_secs(10)).await;
    breaker.try_acquire().unwrap().record_success();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (CircuitState::Closed, CircuitState::Open),
            (CircuitState::Open, CircuitState::HalfOpen),
            (CircuitState::HalfOpen, CircuitState::Closed),
        ]
    );
}

#[tokio::test]
async fn administrative_reset_zeroes_counters() {
    let breaker = breaker(2, 1);
    trip(&breaker, 2);
    let _ = breaker.try_acquire();
    assert_eq!(breaker.metrics().rejected_count, 1);

    breaker.reset();
    let metrics = breaker.metrics();
    assert_eq!(metrics.state, CircuitState::Closed);
    assert_eq!(metrics.total_failures, 0);
    assert_eq!(metrics.rejected_count, 0);

    breaker.force_open();
    assert!(breaker.is_open());
    breaker.force_closed();
    assert!(breaker.try_acquire().is_ok());
}
