//! Property tests for the bulkhead.
//!
//! Invariants tested:
//! - Concurrent calls never exceed capacity
//! - Every caller that waits long enough completes
//! - Permitted plus rejected equals calls made

use proptest::prelude::*;
use safeguard_bulkhead::{Bulkhead, BulkheadConfig, BulkheadError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn bulkhead(capacity: usize, max_wait: Option<Duration>) -> Bulkhead {
    Bulkhead::new(
        BulkheadConfig::builder()
            .name("prop")
            .capacity(capacity)
            .max_wait_duration(max_wait)
            .build()
            .unwrap(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn occupancy_never_exceeds_capacity(
        capacity in 1usize..=20,
        callers in 1usize..=100,
        work_ms in 1u64..=5,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let bulkhead = bulkhead(capacity, None);
            let current = Arc::new(AtomicUsize::new(0));
            let max_seen = Arc::new(AtomicUsize::new(0));

            let handles: Vec<_> = (0..callers)
                .map(|_| {
                    let bulkhead = bulkhead.clone();
                    let current = Arc::clone(&current);
                    let max_seen = Arc::clone(&max_seen);
                    tokio::spawn(async move {
                        bulkhead
                            .call(|| async {
                                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                                max_seen.fetch_max(now, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(work_ms)).await;
                                current.fetch_sub(1, Ordering::SeqCst);
                                Ok::<_, BulkheadError>(())
                            })
                            .await
                    })
                })
                .collect();

            let mut completed = 0;
            for handle in handles {
                if handle.await.unwrap().is_ok() {
                    completed += 1;
                }
            }

            prop_assert!(max_seen.load(Ordering::SeqCst) <= capacity);
            prop_assert_eq!(completed, callers);
            prop_assert_eq!(bulkhead.active_count(), 0);
            Ok(())
        })?;
    }

    #[test]
    fn every_call_is_either_permitted_or_rejected(
        capacity in 1usize..=8,
        held in 0usize..=8,
        callers in 1usize..=30,
    ) {
        let rt = super::paused_runtime();
        rt.block_on(async {
            let bulkhead = bulkhead(capacity, Some(Duration::ZERO));
            let holders: Vec<_> = (0..held.min(capacity))
                .filter_map(|_| bulkhead.try_acquire())
                .collect();

            let admitted: Vec<_> = (0..callers).filter_map(|_| bulkhead.try_acquire()).collect();

            let free = capacity - holders.len();
            prop_assert_eq!(admitted.len(), callers.min(free));

            let stats = bulkhead.stats();
            prop_assert_eq!(stats.permitted + stats.rejected, (holders.len() + callers) as u64);
            Ok(())
        })?;
    }
}
