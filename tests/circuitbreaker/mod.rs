//! Circuit breaker behavior through its public API.
//!
//! - transitions.rs: threshold, recovery timeout, half-open probes
//! - concurrency.rs: many tasks sharing one breaker
//! - layer.rs: tower services sharing registry breakers

mod concurrency;
mod layer;
mod transitions;
