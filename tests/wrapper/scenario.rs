use safeguard::{BulkheadSettings, ProtectConfig, ProtectError, Resilience, StaticConfigSource};
use safeguard_circuitbreaker::CircuitState;
use safeguard_core::{ErrorKind, ResilienceError};
use safeguard_retry::{BackoffStrategy, Jitter, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

fn resilience() -> Resilience {
    super::init_tracing();
    Resilience::builder()
        .config_source(
            StaticConfigSource::new()
                .bulkhead("db_pool", BulkheadSettings::new(2, Some(Duration::ZERO))),
        )
        .build()
}

fn fixed_zero(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .strategy(BackoffStrategy::Fixed)
        .initial_delay(Duration::ZERO)
        .jitter(Jitter::None)
        .build()
        .unwrap()
}

fn db_call(name: &str) -> ProtectConfig<u64, ErrorKind> {
    ProtectConfig::new(name)
        .circuit_breaker("db")
        .bulkhead("db_pool")
        .retry_policy(fixed_zero(3))
}

#[tokio::test]
async fn transient_failures_are_absorbed_end_to_end() {
    let resilience = resilience();
    let config = db_call("load_wallet");
    let calls = AtomicU32::new(0);
    let observed = Mutex::new(Vec::new());

    let balance = resilience
        .protect(&config, || async {
            let breaker = resilience.circuit_breaker("db").unwrap();
            let bulkhead = resilience.bulkhead("db_pool").unwrap();
            observed
                .lock()
                .unwrap()
                .push((breaker.metrics().failure_count, bulkhead.active_count()));

            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ErrorKind::ServiceUnavailable)
            } else {
                Ok(120)
            }
        })
        .await
        .unwrap();

    assert_eq!(balance, 120);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // One logical call holds one slot across all attempts; the breaker has
    // counted both transient failures by the third attempt.
    assert_eq!(*observed.lock().unwrap(), vec![(0, 1), (1, 1), (2, 1)]);

    let breaker = resilience.circuit_breaker("db").unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.metrics().failure_count, 0);
    assert_eq!(resilience.bulkhead("db_pool").unwrap().active_count(), 0);

    let stats = resilience.monitor().stats();
    assert_eq!(stats.total_successes, 1);
    assert_eq!(stats.total_errors, 0);
}

#[tokio::test]
async fn repeated_identical_calls_are_idempotent() {
    let resilience = resilience();
    let config = db_call("read_rate");

    let first = resilience.protect(&config, || async { Ok(42) }).await.unwrap();
    let breaker = resilience.circuit_breaker("db").unwrap();
    let successes = breaker.metrics().success_count;
    let monitored = resilience.monitor().stats().total_successes;

    let second = resilience.protect(&config, || async { Ok(42) }).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(breaker.metrics().success_count, successes + 1);
    assert_eq!(resilience.monitor().stats().total_successes, monitored + 1);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn exhausted_retries_report_every_attempt() {
    let resilience = resilience();
    let config = db_call("load_wallet");

    let err = resilience
        .protect(&config, || async { Err::<u64, _>(ErrorKind::Timeout) })
        .await
        .unwrap_err();

    match err.into_failure() {
        Some(ResilienceError::RetryExhausted { attempts, trail, .. }) => {
            assert_eq!(attempts, 3);
            assert_eq!(trail.len(), 3);
            assert!(trail.iter().all(|f| f.kind == ErrorKind::Timeout));
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }

    let events = resilience.monitor().recent_events(10);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn open_circuit_never_runs_the_operation_and_frees_the_slot() {
    let resilience = resilience();
    resilience.circuit_breaker("db").unwrap().force_open();
    let calls = AtomicU32::new(0);

    let err = resilience
        .protect(&db_call("load_wallet"), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProtectError::Failed(ResilienceError::CircuitOpen { ref name }) if name == "db"
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(resilience.bulkhead("db_pool").unwrap().active_count(), 0);
}

#[tokio::test]
async fn saturated_pool_rejects_the_third_concurrent_call() {
    let resilience = resilience();
    let config = db_call("export");
    let (release, gate) = tokio::sync::watch::channel(false);

    let hold = || {
        let mut gate = gate.clone();
        async move {
            let _ = gate.wait_for(|open| *open).await;
            Ok(1)
        }
    };

    let first = resilience.protect(&config, hold);
    let second = resilience.protect(&config, hold);
    let third = async {
        while resilience.bulkhead("db_pool").map(|b| b.active_count()).unwrap_or(0) < 2 {
            tokio::task::yield_now().await;
        }
        let result = resilience.protect(&config, || async { Ok(3) }).await;
        release.send_replace(true);
        result
    };

    let (first, second, third) = tokio::join!(first, second, third);
    assert_eq!(first.unwrap(), 1);
    assert_eq!(second.unwrap(), 1);
    assert!(matches!(
        third,
        Err(ProtectError::Failed(ResilienceError::BulkheadFull { capacity: 2, .. }))
    ));
    assert_eq!(resilience.monitor().stats().capacity_rejections, 1);
}
