//! Failure classification for circuit breaker decisions.
//!
//! A breaker only counts failures that say something about the dependency's
//! health. The [`FailureClassifier`] decides that from the failure's
//! [`ErrorKind`].

use safeguard_core::ErrorKind;
use std::sync::Arc;

/// Decides whether a failure of a given kind counts toward the threshold.
pub trait FailureClassifier: Send + Sync {
    /// Returns `true` if a failure of this kind should count.
    fn is_failure(&self, kind: ErrorKind) -> bool;
}

/// Shared, type-erased classifier as stored in a configuration.
pub type SharedFailureClassifier = Arc<dyn FailureClassifier>;

/// Counts service failures only: unavailability, timeouts and unknown backend errors.
///
/// ```rust
/// use safeguard_circuitbreaker::classifier::{DefaultClassifier, FailureClassifier};
/// use safeguard_core::ErrorKind;
///
/// assert!(DefaultClassifier.is_failure(ErrorKind::Timeout));
/// assert!(!DefaultClassifier.is_failure(ErrorKind::ValidationFailure));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl FailureClassifier for DefaultClassifier {
    fn is_failure(&self, kind: ErrorKind) -> bool {
        kind.trips_circuit()
    }
}

/// A failure classifier backed by a closure.
///
/// ```rust
/// use safeguard_circuitbreaker::classifier::{FailureClassifier, FnClassifier};
/// use safeguard_core::ErrorKind;
///
/// // Conflicts signal lock contention on this backend, so count them too.
/// let classifier = FnClassifier::new(|kind: ErrorKind| {
///     kind.trips_circuit() || kind == ErrorKind::Conflict
/// });
///
/// assert!(classifier.is_failure(ErrorKind::Conflict));
/// assert!(!classifier.is_failure(ErrorKind::NotFound));
/// ```
#[derive(Clone)]
pub struct FnClassifier<F> {
    f: F,
}

impl<F> FnClassifier<F>
where
    F: Fn(ErrorKind) -> bool + Send + Sync,
{
    /// Creates a new classifier from a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> FailureClassifier for FnClassifier<F>
where
    F: Fn(ErrorKind) -> bool + Send + Sync,
{
    fn is_failure(&self, kind: ErrorKind) -> bool {
        (self.f)(kind)
    }
}

impl<F> std::fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnClassifier").finish_non_exhaustive()
    }
}
