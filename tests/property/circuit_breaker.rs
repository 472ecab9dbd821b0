//! Property tests for the circuit breaker.
//!
//! Invariants tested:
//! - The circuit opens exactly when consecutive failures reach the threshold
//! - An open circuit admits nothing before the recovery timeout

use proptest::prelude::*;
use safeguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use safeguard_core::ErrorKind;
use std::time::Duration;

fn breaker(failure_threshold: u32) -> CircuitBreaker {
    CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("prop")
            .failure_threshold(failure_threshold)
            .recovery_timeout(Duration::from_secs(60))
            .build()
            .unwrap(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn opens_exactly_at_the_threshold(
        failure_threshold in 1u32..=10,
        outcomes in prop::collection::vec(any::<bool>(), 1..=60),
    ) {
        let rt = super::paused_runtime();
        rt.block_on(async {
            let breaker = breaker(failure_threshold);
            let mut consecutive = 0;

            for succeeded in outcomes {
                let Ok(permit) = breaker.try_acquire() else {
                    prop_assert!(consecutive >= failure_threshold);
                    return Ok(());
                };
                if succeeded {
                    consecutive = 0;
                    permit.record_success();
                } else {
                    consecutive += 1;
                    permit.record_failure(ErrorKind::ServiceUnavailable);
                }

                let expected = if consecutive >= failure_threshold {
                    CircuitState::Open
                } else {
                    CircuitState::Closed
                };
                prop_assert_eq!(breaker.state(), expected);
            }
            Ok(())
        })?;
    }

    #[test]
    fn open_circuit_rejects_until_the_timeout(
        attempts in 1usize..=50,
        elapsed_secs in 0u64..60,
    ) {
        let rt = super::paused_runtime();
        rt.block_on(async {
            let breaker = breaker(1);
            breaker
                .try_acquire()
                .unwrap()
                .record_failure(ErrorKind::Timeout);
            tokio::time::advance(Duration::from_secs(elapsed_secs)).await;

            for _ in 0..attempts {
                prop_assert!(breaker.try_acquire().is_err());
            }
            prop_assert_eq!(breaker.metrics().rejected_count, attempts as u64);
            Ok(())
        })?;
    }
}
