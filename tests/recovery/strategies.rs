use safeguard::{BreakerSettings, Resilience, StaticConfigSource};
use safeguard_circuitbreaker::CircuitState;
use safeguard_core::{ErrorContext, ErrorKind};
use safeguard_monitor::AlertType;
use safeguard_recovery::{CircuitBreakerAware, ExternalRestart, Recovery, RecoveryError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test]
async fn restart_hook_runs_before_each_attempt() {
    let resilience = Resilience::new();
    let restarts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&restarts);
    resilience.recovery().register(
        "restart_db",
        ExternalRestart::new(move |_ctx| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    );

    let context = ErrorContext::new("load_orders");
    let orders = resilience
        .recovery()
        .recover(
            &ErrorKind::ServiceUnavailable,
            &context,
            "restart_db",
            |attempt| async move {
                if attempt < 2 {
                    Err(ErrorKind::ServiceUnavailable)
                } else {
                    Ok(vec!["order-1"])
                }
            },
            3,
        )
        .await
        .unwrap();

    assert_eq!(orders, vec!["order-1"]);
    assert_eq!(restarts.load(Ordering::SeqCst), 2);

    let stats = resilience.recovery().stats();
    assert_eq!(stats.total_recoveries, 1);
    assert_eq!(stats.successful_recoveries, 1);
    assert_eq!(stats.by_strategy["restart_db"].successful, 1);
    assert_eq!(resilience.monitor().stats().recovered, 1);
}

#[tokio::test]
async fn failed_restart_abandons_before_any_attempt() {
    let resilience = Resilience::new();
    resilience.recovery().register(
        "restart_db",
        ExternalRestart::new(|_ctx| async { Err("orchestrator unreachable".to_string()) }),
    );
    let attempts = AtomicU32::new(0);

    let err = resilience
        .recovery()
        .recover(
            &ErrorKind::ServiceUnavailable,
            &ErrorContext::new("load_orders"),
            "restart_db",
            |_| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ErrorKind>(())
            },
            3,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RecoveryError::Abandoned { attempts: 0, .. }));
    assert_eq!(attempts.load(Ordering::SeqCst), 0);
    assert_eq!(resilience.monitor().stats().recovery_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn breaker_aware_recovery_waits_for_the_probe_window() {
    let resilience = Resilience::builder()
        .config_source(
            StaticConfigSource::new().breaker("db", BreakerSettings::new(2, Duration::from_secs(10))),
        )
        .build();
    let breaker = resilience.circuit_breaker("db").unwrap();
    for _ in 0..2 {
        breaker
            .try_acquire()
            .unwrap()
            .record_failure(ErrorKind::ServiceUnavailable);
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    resilience.recovery().register(
        "wait_for_db",
        CircuitBreakerAware::new(breaker.clone(), Duration::from_secs(30)),
    );

    let started = Instant::now();
    let value = resilience
        .recovery()
        .recover(
            &ErrorKind::ServiceUnavailable,
            &ErrorContext::new("load_orders"),
            "wait_for_db",
            |_| {
                let breaker = breaker.clone();
                async move { breaker.call(|| async { Ok::<_, ErrorKind>(17) }).await }
            },
            1,
        )
        .await
        .unwrap();

    assert_eq!(value, 17);
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn repeated_recovery_failures_raise_an_alert() {
    let resilience = Resilience::builder().manual_evaluation().build();
    let context = ErrorContext::new("sync_ledger");

    for _ in 0..3 {
        let result = resilience
            .recovery()
            .recover_or_degrade(
                &ErrorKind::Timeout,
                &context,
                "immediate_retry",
                |_| async { Err::<u32, _>(ErrorKind::Timeout) },
                2,
                || async { 0 },
            )
            .await;
        assert_eq!(result, Recovery::Degraded(0));
    }

    let recovery = resilience.health().recovery;
    assert_eq!(recovery.total_recoveries, 3);
    assert_eq!(recovery.degraded, 3);
    assert_eq!(recovery.success_rate, 0.0);

    let evaluation = resilience.monitor().evaluate();
    assert!(evaluation
        .raised
        .iter()
        .any(|a| a.alert_type == AlertType::RecoveryFailure && a.operation == "sync_ledger"));
}
