//! Error types for the bulkhead pattern.

use safeguard_core::{Classify, ErrorKind, ResilienceError};
use std::time::Duration;

/// Errors that can occur when entering a bulkhead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BulkheadError {
    /// The bulkhead is at capacity and the caller did not wait.
    #[error("bulkhead '{name}' is full: max concurrent calls ({capacity}) reached")]
    BulkheadFull {
        /// Bulkhead name.
        name: String,
        /// Configured capacity.
        capacity: usize,
    },
    /// No slot freed up within the wait bound.
    #[error("timeout waiting {waited:?} for a slot in bulkhead '{name}'")]
    Timeout {
        /// Bulkhead name.
        name: String,
        /// Configured capacity.
        capacity: usize,
        /// Time spent waiting.
        waited: Duration,
    },
}

impl BulkheadError {
    pub fn name(&self) -> &str {
        match self {
            BulkheadError::BulkheadFull { name, .. } | BulkheadError::Timeout { name, .. } => name,
        }
    }

    pub fn capacity(&self) -> usize {
        match self {
            BulkheadError::BulkheadFull { capacity, .. }
            | BulkheadError::Timeout { capacity, .. } => *capacity,
        }
    }
}

/// Result type for bulkhead operations.
pub type Result<T> = std::result::Result<T, BulkheadError>;

impl Classify for BulkheadError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::ResourceExhausted
    }
}

// A wait timeout is still a capacity rejection, not a slow dependency.
impl<E> From<BulkheadError> for ResilienceError<E> {
    fn from(err: BulkheadError) -> Self {
        match err {
            BulkheadError::BulkheadFull { name, capacity }
            | BulkheadError::Timeout { name, capacity, .. } => {
                ResilienceError::BulkheadFull { name, capacity }
            }
        }
    }
}
