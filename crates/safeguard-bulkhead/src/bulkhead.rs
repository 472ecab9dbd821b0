//! The bulkhead itself: a named, FIFO-fair slot pool.

use crate::config::BulkheadConfig;
use crate::error::BulkheadError;
use crate::events::BulkheadEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

#[derive(Debug, Default)]
struct Counters {
    permitted: AtomicU64,
    rejected: AtomicU64,
}

/// Snapshot of a bulkhead's occupancy and counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkheadStats {
    pub name: String,
    pub capacity: usize,
    /// Slots currently held.
    pub active_count: usize,
    /// Grants since creation or the last [`Bulkhead::reset_stats`].
    pub permitted: u64,
    /// Rejections since creation or the last [`Bulkhead::reset_stats`].
    pub rejected: u64,
    /// `rejected / (permitted + rejected)`, 0 when nothing was attempted.
    pub rejection_rate: f64,
}

/// A named concurrency limiter.
///
/// Waiters are served in arrival order: a freed slot goes to the oldest
/// queued caller, never to a caller that arrives later. Cloning is cheap and
/// every clone shares the same slots.
///
/// ```rust
/// use safeguard_bulkhead::{Bulkhead, BulkheadConfig};
/// use std::time::Duration;
///
/// # async fn example() {
/// let bulkhead = Bulkhead::new(
///     BulkheadConfig::builder().name("db_pool").capacity(2).build().unwrap(),
/// );
///
/// let slot = bulkhead.acquire(Duration::from_millis(100)).await.unwrap();
/// assert_eq!(bulkhead.active_count(), 1);
/// drop(slot);
/// assert_eq!(bulkhead.active_count(), 0);
/// # }
/// ```
#[derive(Clone)]
pub struct Bulkhead {
    semaphore: Arc<Semaphore>,
    config: Arc<BulkheadConfig>,
    counters: Arc<Counters>,
}

impl Bulkhead {
    /// Creates an empty bulkhead.
    pub fn new(config: BulkheadConfig) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "bulkhead_calls_permitted_total",
                    "Total number of slots granted by the bulkhead"
                );
                describe_counter!(
                    "bulkhead_calls_rejected_total",
                    "Total number of callers turned away by the bulkhead"
                );
                describe_gauge!("bulkhead_active_calls", "Current number of held slots");
                describe_histogram!(
                    "bulkhead_wait_duration_seconds",
                    "Time spent queued for a slot"
                );
            });
        }

        Self {
            semaphore: Arc::new(Semaphore::new(config.capacity)),
            config: Arc::new(config),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn config(&self) -> &BulkheadConfig {
        &self.config
    }

    /// Slots currently held.
    pub fn active_count(&self) -> usize {
        self.config
            .capacity
            .saturating_sub(self.semaphore.available_permits())
    }

    /// Waits up to `timeout` for a slot.
    ///
    /// Returns `None` if no slot freed in time. A zero timeout never queues.
    pub async fn acquire(&self, timeout: Duration) -> Option<BulkheadPermit> {
        let started = Instant::now();

        let permit = if timeout.is_zero() {
            Arc::clone(&self.semaphore).try_acquire_owned().ok()
        } else {
            tokio::time::timeout(timeout, Arc::clone(&self.semaphore).acquire_owned())
                .await
                .ok()
                .and_then(Result::ok)
        };

        match permit {
            Some(permit) => Some(self.granted(permit, started)),
            None => {
                self.rejected(started);
                None
            }
        }
    }

    /// Takes a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<BulkheadPermit> {
        let started = Instant::now();
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Some(self.granted(permit, started)),
            Err(_) => {
                self.rejected(started);
                None
            }
        }
    }

    /// Takes a slot using the configured wait bound.
    pub async fn enter(&self) -> Result<BulkheadPermit, BulkheadError> {
        match self.config.max_wait_duration {
            Some(wait) => self.acquire(wait).await.ok_or_else(|| {
                if wait.is_zero() {
                    BulkheadError::BulkheadFull {
                        name: self.config.name.clone(),
                        capacity: self.config.capacity,
                    }
                } else {
                    BulkheadError::Timeout {
                        name: self.config.name.clone(),
                        capacity: self.config.capacity,
                        waited: wait,
                    }
                }
            }),
            None => {
                let started = Instant::now();
                match Arc::clone(&self.semaphore).acquire_owned().await {
                    Ok(permit) => Ok(self.granted(permit, started)),
                    // The semaphore is never closed; treat it as saturation regardless.
                    Err(_) => {
                        self.rejected(started);
                        Err(BulkheadError::BulkheadFull {
                            name: self.config.name.clone(),
                            capacity: self.config.capacity,
                        })
                    }
                }
            }
        }
    }

    /// Runs `operation` inside a slot. The slot is released on every exit path.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<BulkheadError>,
    {
        let _slot = self.enter().await?;
        operation().await
    }

    /// Returns occupancy and counters.
    pub fn stats(&self) -> BulkheadStats {
        let permitted = self.counters.permitted.load(Ordering::Relaxed);
        let rejected = self.counters.rejected.load(Ordering::Relaxed);
        let attempted = permitted + rejected;

        BulkheadStats {
            name: self.config.name.clone(),
            capacity: self.config.capacity,
            active_count: self.active_count(),
            permitted,
            rejected,
            rejection_rate: if attempted == 0 {
                0.0
            } else {
                rejected as f64 / attempted as f64
            },
        }
    }

    /// Zeroes the permitted and rejected counters. Held slots are unaffected.
    pub fn reset_stats(&self) {
        self.counters.permitted.store(0, Ordering::Relaxed);
        self.counters.rejected.store(0, Ordering::Relaxed);
    }

    /// Returns a tower layer that routes calls through this bulkhead.
    pub fn layer(&self) -> crate::BulkheadLayer {
        crate::BulkheadLayer::new(self.clone())
    }

    fn granted(&self, permit: OwnedSemaphorePermit, started: Instant) -> BulkheadPermit {
        self.counters.permitted.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let waited = now.saturating_duration_since(started);
        let active_count = self.active_count();

        self.config
            .event_listeners
            .emit(&BulkheadEvent::CallPermitted {
                source: self.config.name.clone(),
                timestamp: now,
                active_count,
                waited,
            });

        #[cfg(feature = "tracing")]
        tracing::trace!(bulkhead = %self.config.name, active_count, ?waited, "bulkhead slot granted");

        #[cfg(feature = "metrics")]
        {
            counter!("bulkhead_calls_permitted_total", "bulkhead" => self.config.name.clone())
                .increment(1);
            gauge!("bulkhead_active_calls", "bulkhead" => self.config.name.clone())
                .set(active_count as f64);
            histogram!("bulkhead_wait_duration_seconds", "bulkhead" => self.config.name.clone())
                .record(waited.as_secs_f64());
        }

        BulkheadPermit {
            _permit: permit,
            bulkhead: self.clone(),
            granted_at: now,
        }
    }

    fn rejected(&self, started: Instant) {
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let waited = now.saturating_duration_since(started);

        self.config
            .event_listeners
            .emit(&BulkheadEvent::CallRejected {
                source: self.config.name.clone(),
                timestamp: now,
                capacity: self.config.capacity,
                waited,
            });

        #[cfg(feature = "tracing")]
        tracing::debug!(bulkhead = %self.config.name, capacity = self.config.capacity, ?waited, "bulkhead rejected caller");

        #[cfg(feature = "metrics")]
        counter!("bulkhead_calls_rejected_total", "bulkhead" => self.config.name.clone())
            .increment(1);
    }
}

impl std::fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bulkhead")
            .field("name", &self.config.name)
            .field("capacity", &self.config.capacity)
            .field("active_count", &self.active_count())
            .finish()
    }
}

/// A held bulkhead slot. Dropping it releases the slot to the next waiter.
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct BulkheadPermit {
    _permit: OwnedSemaphorePermit,
    bulkhead: Bulkhead,
    granted_at: Instant,
}

impl BulkheadPermit {
    /// Releases the slot now.
    pub fn release(self) {}

    /// The bulkhead this slot belongs to.
    pub fn bulkhead(&self) -> &Bulkhead {
        &self.bulkhead
    }
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        let config = &self.bulkhead.config;
        let now = Instant::now();
        config.event_listeners.emit(&BulkheadEvent::SlotReleased {
            source: config.name.clone(),
            timestamp: now,
            held_for: now.saturating_duration_since(self.granted_at),
        });

        // The slot itself is returned right after this, when `_permit` drops.
        #[cfg(feature = "metrics")]
        gauge!("bulkhead_active_calls", "bulkhead" => config.name.clone())
            .set(self.bulkhead.active_count().saturating_sub(1) as f64);
    }
}

impl std::fmt::Debug for BulkheadPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkheadPermit")
            .field("bulkhead", &self.bulkhead.config.name)
            .finish()
    }
}
