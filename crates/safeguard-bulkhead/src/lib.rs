//! Bulkheads for named resource pools.
//!
//! A bulkhead caps how many operations run against one resource at a time,
//! so saturation of one pool cannot drain capacity from the others. This
//! implementation sits on a fair `tokio::sync::Semaphore`: excess callers
//! queue in arrival order and either get the next freed slot or give up
//! after their wait bound.
//!
//! # Basic Example
//!
//! ```rust
//! use safeguard_bulkhead::{Bulkhead, BulkheadConfig, BulkheadError};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), BulkheadError> {
//! let bulkhead = Bulkhead::new(
//!     BulkheadConfig::builder()
//!         .name("db_pool")
//!         .capacity(10)
//!         .max_wait_duration(Some(Duration::from_secs(2)))
//!         .build()
//!         .unwrap(),
//! );
//!
//! let rows = bulkhead
//!     .call(|| async { Ok::<_, BulkheadError>(vec!["alice", "bob"]) })
//!     .await?;
//! assert_eq!(rows.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! # Scoped Slots
//!
//! [`Bulkhead::acquire`] hands out a [`BulkheadPermit`]; the slot is released
//! when the permit drops, on every exit path including panics and
//! cancellation.
//!
//! ```rust
//! use safeguard_bulkhead::{Bulkhead, BulkheadConfig};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let bulkhead = Bulkhead::new(BulkheadConfig::builder().capacity(1).build().unwrap());
//!
//! match bulkhead.acquire(Duration::ZERO).await {
//!     Some(_slot) => { /* use the resource */ }
//!     None => { /* saturated: shed load */ }
//! }
//! # }
//! ```
//!
//! # Example with Event Listeners
//!
//! ```rust
//! use safeguard_bulkhead::BulkheadConfig;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let rejections = Arc::new(AtomicUsize::new(0));
//! let r = rejections.clone();
//!
//! let config = BulkheadConfig::builder()
//!     .capacity(5)
//!     .on_call_rejected(move |_| {
//!         r.fetch_add(1, Ordering::SeqCst);
//!     })
//!     .build()
//!     .unwrap();
//! ```

pub mod bulkhead;
pub mod config;
pub mod error;
pub mod events;
pub mod layer;

pub use bulkhead::{Bulkhead, BulkheadPermit, BulkheadStats};
pub use config::{BulkheadConfig, BulkheadConfigBuilder};
pub use error::{BulkheadError, Result};
pub use events::BulkheadEvent;
pub use layer::{BulkheadLayer, BulkheadService};
