use safeguard_core::{AttemptFailure, Classify, ErrorKind, ResilienceError};
use thiserror::Error;

/// Outcome of a retried operation that did not succeed.
#[derive(Debug, Clone, Error)]
pub enum RetryError<E> {
    /// Every permitted attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// One entry per failed attempt, oldest first.
        trail: Vec<AttemptFailure>,
        /// The final error.
        last: E,
    },
    /// An attempt failed with an error the policy does not retry.
    #[error("attempt {attempt} failed and is not retryable: {error}")]
    NotRetryable {
        /// The attempt that failed, 1-based.
        attempt: u32,
        /// Failures up to and including this one.
        trail: Vec<AttemptFailure>,
        /// The error that stopped the sequence.
        error: E,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::NotRetryable { attempt, .. } => *attempt,
        }
    }

    pub fn trail(&self) -> &[AttemptFailure] {
        match self {
            RetryError::Exhausted { trail, .. } | RetryError::NotRetryable { trail, .. } => trail,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// The last error observed.
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::NotRetryable { error, .. } => error,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::NotRetryable { error, .. } => error,
        }
    }
}

impl<E: Classify> Classify for RetryError<E> {
    fn kind(&self) -> ErrorKind {
        self.last_error().kind()
    }
}

// A single failed attempt surfaces as itself; only a real sequence becomes
// `RetryExhausted`.
impl<E> From<RetryError<ResilienceError<E>>> for ResilienceError<E> {
    fn from(err: RetryError<ResilienceError<E>>) -> Self {
        match err {
            RetryError::Exhausted {
                attempts,
                trail,
                last,
            } if attempts > 1 => ResilienceError::RetryExhausted {
                attempts,
                trail,
                last: Box::new(last),
            },
            other => other.into_inner(),
        }
    }
}
