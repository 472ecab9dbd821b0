use safeguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use safeguard_core::ErrorKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn breaker(failure_threshold: u32) -> CircuitBreaker {
    CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("inventory")
            .failure_threshold(failure_threshold)
            .recovery_timeout(Duration::from_secs(60))
            .build()
            .unwrap(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_open_the_circuit_once() {
    let transitions = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&transitions);
    let breaker = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("inventory")
            .failure_threshold(10)
            .recovery_timeout(Duration::from_secs(60))
            .on_state_transition(move |_, to| {
                if to == CircuitState::Open {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build()
            .unwrap(),
    );
    let invoked = Arc::new(AtomicU64::new(0));

    let mut handles = Vec::new();
    for _ in 0..100 {
        let breaker = breaker.clone();
        let invoked = Arc::clone(&invoked);
        handles.push(tokio::spawn(async move {
            breaker
                .call(|| async {
                    invoked.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    Err::<(), _>(ErrorKind::ServiceUnavailable)
                })
                .await
        }));
    }

    let mut rejected = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap_err().is_circuit_open() {
            rejected += 1;
        }
    }

    let metrics = breaker.metrics();
    assert_eq!(metrics.state, CircuitState::Open);
    assert_eq!(invoked.load(Ordering::SeqCst) + rejected, 100);
    assert_eq!(metrics.rejected_count, rejected);
    assert!(invoked.load(Ordering::SeqCst) >= 10);
    assert_eq!(transitions.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_successes_are_all_counted() {
    let breaker = breaker(3);

    let mut handles = Vec::new();
    for _ in 0..200 {
        let breaker = breaker.clone();
        handles.push(tokio::spawn(async move {
            breaker.call(|| async { Ok::<_, ErrorKind>(()) }).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let metrics = breaker.metrics();
    assert_eq!(metrics.state, CircuitState::Closed);
    assert_eq!(metrics.success_count, 200);
    assert_eq!(metrics.rejected_count, 0);
}
