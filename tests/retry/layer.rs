use safeguard_core::ErrorKind;
use safeguard_retry::{BackoffStrategy, Jitter, RetryEngine, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{service_fn, ServiceBuilder, ServiceExt};

fn fixed(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .strategy(BackoffStrategy::Fixed)
        .initial_delay(Duration::from_millis(50))
        .jitter(Jitter::None)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn layer_resends_the_request_until_it_succeeds() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let service = ServiceBuilder::new()
        .layer(RetryEngine::default().layer(fixed(3)))
        .service(service_fn(move |sku: String| {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ErrorKind::Timeout)
                } else {
                    Ok(format!("{sku}: 4 in stock"))
                }
            }
        }));

    let reply = service.oneshot("sku-9".to_string()).await.unwrap();
    assert_eq!(reply, "sku-9: 4 in stock");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn layer_reports_every_attempt_when_exhausted() {
    let service = ServiceBuilder::new()
        .layer(RetryEngine::default().layer(fixed(2)))
        .service(service_fn(|_: ()| async { Err::<(), _>(ErrorKind::ServiceUnavailable) }));

    let err = service.oneshot(()).await.unwrap_err();
    assert!(err.is_exhausted());
    let attempts: Vec<_> = err.trail().iter().map(|f| f.attempt).collect();
    assert_eq!(attempts, vec![1, 2]);
}
