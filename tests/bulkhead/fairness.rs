use safeguard_bulkhead::{Bulkhead, BulkheadConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn single_slot() -> Bulkhead {
    Bulkhead::new(
        BulkheadConfig::builder()
            .name("report_renderer")
            .capacity(1)
            .build()
            .unwrap(),
    )
}

#[tokio::test(start_paused = true)]
async fn freed_slot_goes_to_the_queued_waiter_not_a_newcomer() {
    let bulkhead = single_slot();
    let holder = bulkhead.try_acquire().unwrap();

    let queued = {
        let bulkhead = bulkhead.clone();
        tokio::spawn(async move { bulkhead.acquire(Duration::from_secs(10)).await.is_some() })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;

    drop(holder);
    assert!(bulkhead.try_acquire().is_none());
    assert!(queued.await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn waiters_are_served_in_arrival_order() {
    let bulkhead = single_slot();
    let order = Arc::new(Mutex::new(Vec::new()));
    let holder = bulkhead.try_acquire().unwrap();

    let mut handles = Vec::new();
    for id in 0..4 {
        let bulkhead = bulkhead.clone();
        let order = Arc::clone(&order);
        handles.push(tokio::spawn(async move {
            let _slot = bulkhead.acquire(Duration::from_secs(60)).await.unwrap();
            order.lock().unwrap().push(id);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }));
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    drop(holder);
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
}
