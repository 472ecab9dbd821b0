//! Repeated-error patterns keyed by `(operation, kind)`.

use safeguard_core::ErrorKind;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::time::Instant;

/// How often one kind of failure hit one operation inside the detection window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPattern {
    pub signature: u64,
    pub operation: String,
    pub kind: ErrorKind,
    pub occurrence_count: u64,
    #[serde(skip)]
    pub window_start: Instant,
    #[serde(skip)]
    pub window_end: Instant,
}

impl ErrorPattern {
    pub(crate) fn new(
        operation: &str,
        kind: ErrorKind,
        occurrence_count: u64,
        window_start: Instant,
        window_end: Instant,
    ) -> Self {
        Self {
            signature: signature(operation, kind),
            operation: operation.to_string(),
            kind,
            occurrence_count,
            window_start,
            window_end,
        }
    }
}

/// Stable hash of an `(operation, kind)` pair.
pub fn signature(operation: &str, kind: ErrorKind) -> u64 {
    let mut hasher = DefaultHasher::new();
    operation.hash(&mut hasher);
    kind.hash(&mut hasher);
    hasher.finish()
}
