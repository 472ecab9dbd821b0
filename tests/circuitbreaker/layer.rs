use safeguard::{BreakerSettings, Resilience, StaticConfigSource};
use safeguard_circuitbreaker::CircuitState;
use safeguard_core::ErrorKind;
use std::time::Duration;
use tower::{service_fn, Layer, ServiceExt};

fn resilience() -> Resilience {
    Resilience::builder()
        .config_source(
            StaticConfigSource::new().breaker("payments", BreakerSettings::new(2, Duration::from_secs(30))),
        )
        .build()
}

#[tokio::test]
async fn tower_stack_and_registry_share_one_breaker() {
    let resilience = resilience();
    let breaker = resilience.circuit_breaker("payments").unwrap();

    let service = breaker
        .layer()
        .layer(service_fn(|amount: u64| async move {
            if amount == 0 {
                Err(ErrorKind::ServiceUnavailable)
            } else {
                Ok(amount)
            }
        }));

    assert_eq!(service.clone().oneshot(10).await.unwrap(), 10);
    assert!(service.clone().oneshot(0).await.is_err());
    assert!(service.clone().oneshot(0).await.is_err());

    let same = resilience.circuit_breaker("payments").unwrap();
    assert_eq!(same.state(), CircuitState::Open);
    assert_eq!(same.metrics().success_count, 1);

    let err = service.oneshot(10).await.unwrap_err();
    assert!(err.is_circuit_open());
}

#[tokio::test]
async fn inner_errors_pass_through_unchanged() {
    let resilience = resilience();
    let service = resilience
        .circuit_breaker("payments")
        .unwrap()
        .layer()
        .layer(service_fn(|_: ()| async { Err::<(), _>(ErrorKind::NotFound) }));

    let err = service.oneshot(()).await.unwrap_err();
    assert_eq!(err.into_inner(), Some(ErrorKind::NotFound));
    assert_eq!(
        resilience.health().breaker("payments").unwrap().state,
        CircuitState::Closed
    );
}
