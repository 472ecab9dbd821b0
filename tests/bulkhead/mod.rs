//! Bulkhead integration tests: capacity, queueing order and slot release.

mod capacity;
mod fairness;
