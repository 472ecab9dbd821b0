//! Invariants that hold for any generated configuration and call sequence.

mod backoff;
mod bulkhead;
mod circuit_breaker;
mod retry;

use tokio::runtime::{Builder, Runtime};

/// Single-threaded runtime whose clock auto-advances through sleeps.
pub(crate) fn paused_runtime() -> Runtime {
    Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}
