use safeguard::{ProtectConfig, Resilience};
use safeguard_bulkhead::{Bulkhead, BulkheadConfig};
use safeguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use safeguard_core::{ErrorKind, ResilienceError};
use std::sync::Arc;
use std::time::Duration;
use tower::{service_fn, Layer, ServiceExt};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_lookups_share_one_breaker() {
    let resilience = Arc::new(Resilience::new());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let resilience = Arc::clone(&resilience);
            tokio::spawn(async move { resilience.circuit_breaker("inventory").unwrap() })
        })
        .collect();
    let mut breakers = Vec::new();
    for handle in handles {
        breakers.push(handle.await.unwrap());
    }

    breakers[0].force_open();
    assert!(breakers.iter().all(|b| b.state() == CircuitState::Open));
    assert_eq!(resilience.health().breakers.len(), 1);
}

#[tokio::test]
async fn registered_breaker_replaces_configured_defaults() {
    let resilience = Resilience::new();
    resilience.register_circuit_breaker(CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("smtp")
            .failure_threshold(1)
            .recovery_timeout(Duration::from_secs(300))
            .build()
            .unwrap(),
    ));

    let config = ProtectConfig::<(), ErrorKind>::new("send_receipt").circuit_breaker("smtp");
    let _ = resilience
        .protect(&config, || async { Err(ErrorKind::ServiceUnavailable) })
        .await;

    assert_eq!(
        resilience.circuit_breaker("smtp").unwrap().state(),
        CircuitState::Open
    );
}

#[tokio::test]
async fn tower_services_and_protect_share_the_same_slots() {
    let resilience = Resilience::new();
    resilience.register_bulkhead(Bulkhead::new(
        BulkheadConfig::builder()
            .name("renderer")
            .capacity(1)
            .max_wait_duration(Some(Duration::ZERO))
            .build()
            .unwrap(),
    ));
    let bulkhead = resilience.bulkhead("renderer").unwrap();
    let (release, gate) = tokio::sync::oneshot::channel::<()>();

    let service = bulkhead
        .layer()
        .layer(service_fn(|gate: tokio::sync::oneshot::Receiver<()>| async move {
            let _ = gate.await;
            Ok::<_, ResilienceError<ErrorKind>>("rendered")
        }));
    let busy = tokio::spawn(service.oneshot(gate));
    while bulkhead.active_count() == 0 {
        tokio::task::yield_now().await;
    }

    let config = ProtectConfig::<&str, ErrorKind>::new("render_invoice").bulkhead("renderer");
    let err = resilience
        .protect(&config, || async { Ok("rendered") })
        .await
        .unwrap_err();
    assert!(matches!(
        err.as_failure(),
        Some(ResilienceError::BulkheadFull { .. })
    ));

    release.send(()).unwrap();
    assert_eq!(busy.await.unwrap().unwrap(), "rendered");
    assert_eq!(bulkhead.active_count(), 0);
}
