use safeguard_bulkhead::{Bulkhead, BulkheadConfig, BulkheadError};
use safeguard_core::{ErrorKind, ResilienceError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn bulkhead(capacity: usize, max_wait: Option<Duration>) -> Bulkhead {
    Bulkhead::new(
        BulkheadConfig::builder()
            .name("db_pool")
            .capacity(capacity)
            .max_wait_duration(max_wait)
            .build()
            .unwrap(),
    )
}

#[tokio::test]
async fn eleventh_caller_is_rejected_without_waiting() {
    let bulkhead = bulkhead(10, None);
    let held: Vec<_> = (0..10).map(|_| bulkhead.try_acquire().unwrap()).collect();
    assert_eq!(bulkhead.active_count(), 10);

    assert!(bulkhead.acquire(Duration::ZERO).await.is_none());

    let stats = bulkhead.stats();
    assert_eq!(stats.permitted, 10);
    assert_eq!(stats.rejected, 1);
    assert!((stats.rejection_rate - 1.0 / 11.0).abs() < 1e-9);

    drop(held);
    assert_eq!(bulkhead.active_count(), 0);
    assert!(bulkhead.acquire(Duration::ZERO).await.is_some());
}

#[tokio::test(start_paused = true)]
async fn bounded_wait_times_out() {
    let bulkhead = bulkhead(1, Some(Duration::from_millis(250)));
    let _held = bulkhead.try_acquire().unwrap();

    let started = tokio::time::Instant::now();
    let err = bulkhead.enter().await.unwrap_err();
    assert!(matches!(err, BulkheadError::Timeout { .. }));
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert_eq!(err.capacity(), 1);
}

#[tokio::test]
async fn zero_wait_reports_a_full_bulkhead() {
    let bulkhead = bulkhead(1, Some(Duration::ZERO));
    let _held = bulkhead.try_acquire().unwrap();

    let err = bulkhead.enter().await.unwrap_err();
    assert_eq!(
        err,
        BulkheadError::BulkheadFull {
            name: "db_pool".to_string(),
            capacity: 1,
        }
    );
}

#[tokio::test]
async fn slot_is_released_when_the_operation_fails() {
    let bulkhead = bulkhead(1, Some(Duration::ZERO));

    let result = bulkhead
        .call(|| async {
            Err::<(), ResilienceError<ErrorKind>>(ResilienceError::Application(
                ErrorKind::ServiceUnavailable,
            ))
        })
        .await;
    assert!(result.is_err());
    assert_eq!(bulkhead.active_count(), 0);

    let value = bulkhead
        .call(|| async { Ok::<_, ResilienceError<ErrorKind>>(7) })
        .await
        .unwrap();
    assert_eq!(value, 7);
}

#[tokio::test]
async fn slot_is_released_when_the_caller_is_cancelled() {
    let bulkhead = bulkhead(1, None);

    let inner = bulkhead.clone();
    let task = tokio::spawn(async move {
        inner
            .call(|| async {
                std::future::pending::<()>().await;
                Ok::<_, ResilienceError<ErrorKind>>(())
            })
            .await
    });
    while bulkhead.active_count() == 0 {
        tokio::task::yield_now().await;
    }

    task.abort();
    let _ = task.await;
    assert_eq!(bulkhead.active_count(), 0);
}

#[tokio::test]
async fn callbacks_see_grants_rejections_and_releases() {
    let permitted = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));
    let released = Arc::new(AtomicUsize::new(0));

    let (p, r, s) = (
        Arc::clone(&permitted),
        Arc::clone(&rejected),
        Arc::clone(&released),
    );
    let bulkhead = Bulkhead::new(
        BulkheadConfig::builder()
            .name("smtp")
            .capacity(1)
            .on_call_permitted(move |_| {
                p.fetch_add(1, Ordering::SeqCst);
            })
            .on_call_rejected(move |_| {
                r.fetch_add(1, Ordering::SeqCst);
            })
            .on_slot_released(move |_| {
                s.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    );

    let slot = bulkhead.try_acquire().unwrap();
    assert!(bulkhead.try_acquire().is_none());
    slot.release();

    assert_eq!(permitted.load(Ordering::SeqCst), 1);
    assert_eq!(rejected.load(Ordering::SeqCst), 1);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn occupancy_never_exceeds_capacity() {
    let bulkhead = bulkhead(3, None);
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..40 {
        let bulkhead = bulkhead.clone();
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        handles.push(tokio::spawn(async move {
            let _slot = bulkhead.enter().await.unwrap();
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(bulkhead.stats().permitted, 40);
    assert_eq!(bulkhead.active_count(), 0);
}
