//! Property tests for the retry engine.
//!
//! Invariants tested:
//! - A persistently retryable failure runs exactly max_attempts times
//! - Success on attempt N stops retrying
//! - Never-retried kinds run once regardless of policy

use super::paused_runtime;
use proptest::prelude::*;
use safeguard_core::{ErrorContext, ErrorKind};
use safeguard_retry::{BackoffStrategy, Jitter, RetryEngine, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .strategy(BackoffStrategy::Exponential)
        .initial_delay(Duration::from_millis(10))
        .max_delay(Duration::from_secs(1))
        .jitter(Jitter::Full)
        .build()
        .unwrap()
}

fn retryable_kind() -> impl Strategy<Value = ErrorKind> {
    prop_oneof![Just(ErrorKind::ServiceUnavailable), Just(ErrorKind::Timeout)]
}

fn caller_fault() -> impl Strategy<Value = ErrorKind> {
    prop_oneof![
        Just(ErrorKind::ValidationFailure),
        Just(ErrorKind::PermissionDenied),
        Just(ErrorKind::NotFound),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn persistent_failures_use_every_attempt(
        max_attempts in 1u32..=10,
        kind in retryable_kind(),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let calls = AtomicU32::new(0);
            let err = RetryEngine::default()
                .execute(&policy(max_attempts), &ErrorContext::new("prop"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(kind)
                })
                .await
                .unwrap_err();

            prop_assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
            prop_assert_eq!(err.attempts(), max_attempts);
            prop_assert!(err.is_exhausted());
            Ok(())
        })?;
    }

    #[test]
    fn success_stops_retrying(
        max_attempts in 1u32..=10,
        succeed_on in 1u32..=10,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let calls = AtomicU32::new(0);
            let result = RetryEngine::default()
                .execute(&policy(max_attempts), &ErrorContext::new("prop"), || async {
                    let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempt >= succeed_on {
                        Ok(attempt)
                    } else {
                        Err(ErrorKind::ServiceUnavailable)
                    }
                })
                .await;

            if succeed_on <= max_attempts {
                prop_assert_eq!(result.ok(), Some(succeed_on));
                prop_assert_eq!(calls.load(Ordering::SeqCst), succeed_on);
            } else {
                prop_assert!(result.is_err());
                prop_assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
            }
            Ok(())
        })?;
    }

    #[test]
    fn caller_faults_run_once(
        max_attempts in 1u32..=10,
        kind in caller_fault(),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let calls = AtomicU32::new(0);
            let policy = RetryPolicy::retry_all_except_non_retryable(max_attempts).unwrap();
            let err = RetryEngine::default()
                .execute(&policy, &ErrorContext::new("prop"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(kind)
                })
                .await
                .unwrap_err();

            prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
            prop_assert!(!err.is_exhausted());
            Ok(())
        })?;
    }
}
