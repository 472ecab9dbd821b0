use safeguard_core::{ErrorContext, ErrorKind};
use safeguard_retry::{BackoffStrategy, Jitter, RetryConfig, RetryEngine, RetryError, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn recording_engine() -> (RetryEngine, Arc<Mutex<Vec<(u32, Duration)>>>) {
    let retries = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&retries);
    let engine = RetryEngine::new(
        RetryConfig::builder()
            .name("ledger")
            .on_retry(move |attempt, delay| sink.lock().unwrap().push((attempt, delay)))
            .build(),
    );
    (engine, retries)
}

fn exponential(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .strategy(BackoffStrategy::Exponential)
        .initial_delay(Duration::from_secs(1))
        .backoff_factor(2.0)
        .jitter(Jitter::None)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn exponential_backoff_sleeps_between_attempts() {
    let (engine, retries) = recording_engine();
    let calls = AtomicU32::new(0);
    let started = Instant::now();

    let err = engine
        .execute(&exponential(3), &ErrorContext::new("post_entry"), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ErrorKind::ServiceUnavailable)
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(err.is_exhausted());
    assert_eq!(err.attempts(), 3);
    assert_eq!(err.trail().len(), 3);
    assert_eq!(
        *retries.lock().unwrap(),
        vec![(1, Duration::from_secs(1)), (2, Duration::from_secs(2))]
    );
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn single_attempt_never_backs_off() {
    let (engine, retries) = recording_engine();
    let calls = AtomicU32::new(0);

    let result = engine
        .execute(&exponential(1), &ErrorContext::new("post_entry"), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ErrorKind::Timeout)
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(result, Err(RetryError::Exhausted { attempts: 1, .. })));
    assert!(retries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn non_retryable_kinds_win_over_the_allow_list() {
    let (engine, _) = recording_engine();
    let policy = RetryPolicy::builder()
        .max_attempts(5)
        .strategy(BackoffStrategy::Fixed)
        .initial_delay(Duration::ZERO)
        .retry_on(ErrorKind::Conflict)
        .never_retry(ErrorKind::Conflict)
        .build()
        .unwrap();
    let calls = AtomicU32::new(0);

    let err = engine
        .execute(&policy, &ErrorContext::new("reserve"), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ErrorKind::Conflict)
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(err, RetryError::NotRetryable { attempt: 1, .. }));
}

#[tokio::test]
async fn caller_faults_are_never_retried_even_when_retrying_everything() {
    let (engine, _) = recording_engine();
    let policy = RetryPolicy::builder()
        .max_attempts(4)
        .initial_delay(Duration::ZERO)
        .retry_all_except_non_retryable()
        .build()
        .unwrap();

    for kind in [
        ErrorKind::ValidationFailure,
        ErrorKind::PermissionDenied,
        ErrorKind::NotFound,
        ErrorKind::ResourceExhausted,
    ] {
        let calls = AtomicU32::new(0);
        let err = engine
            .execute(&policy, &ErrorContext::new("reserve"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(kind)
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1, "{kind} was retried");
        assert_eq!(*err.last_error(), kind);
    }
}

#[tokio::test(start_paused = true)]
async fn success_after_transient_failures_keeps_the_value() {
    let successes = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&successes);
    let engine = RetryEngine::new(
        RetryConfig::builder()
            .name("ledger")
            .on_success(move |attempts| seen.store(attempts, Ordering::SeqCst))
            .build(),
    );
    let calls = AtomicU32::new(0);

    let value = engine
        .execute(&exponential(4), &ErrorContext::new("post_entry"), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ErrorKind::Timeout)
            } else {
                Ok("posted")
            }
        })
        .await
        .unwrap();

    assert_eq!(value, "posted");
    assert_eq!(successes.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn linear_delays_grow_past_max_delay() {
    let (engine, retries) = recording_engine();
    let policy = RetryPolicy::builder()
        .max_attempts(4)
        .strategy(BackoffStrategy::Linear)
        .initial_delay(Duration::from_secs(10))
        .max_delay(Duration::from_secs(15))
        .jitter(Jitter::None)
        .build()
        .unwrap();

    let _ = engine
        .execute(&policy, &ErrorContext::new("post_entry"), || async {
            Err::<(), _>(ErrorKind::ServiceUnavailable)
        })
        .await;

    let delays: Vec<_> = retries.lock().unwrap().iter().map(|(_, d)| *d).collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_secs(10),
            Duration::from_secs(20),
            Duration::from_secs(30),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn delays_are_capped_at_max_delay() {
    let (engine, retries) = recording_engine();
    let policy = RetryPolicy::builder()
        .max_attempts(5)
        .strategy(BackoffStrategy::Exponential)
        .initial_delay(Duration::from_secs(1))
        .backoff_factor(10.0)
        .max_delay(Duration::from_secs(5))
        .jitter(Jitter::None)
        .build()
        .unwrap();

    let _ = engine
        .execute(&policy, &ErrorContext::new("post_entry"), || async {
            Err::<(), _>(ErrorKind::ServiceUnavailable)
        })
        .await;

    let delays: Vec<_> = retries.lock().unwrap().iter().map(|(_, d)| *d).collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(5),
            Duration::from_secs(5),
            Duration::from_secs(5),
        ]
    );
}
