use safeguard_core::{Classify, ErrorKind, ResilienceError};
use std::time::Duration;
use thiserror::Error;

/// Rejection returned when the circuit does not admit a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker '{name}' is open; call not permitted")]
pub struct CircuitOpen {
    /// Breaker name.
    pub name: String,
    /// Time left until the breaker will admit a probe, when known.
    pub retry_after: Option<Duration>,
}

/// Errors returned by [`CircuitBreaker::call`](crate::CircuitBreaker::call) and the tower service.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error(transparent)]
    OpenCircuit(CircuitOpen),

    /// An error returned by the protected operation.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the error indicates the circuit is open.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit(_))
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<CircuitOpen> for CircuitBreakerError<E> {
    fn from(open: CircuitOpen) -> Self {
        CircuitBreakerError::OpenCircuit(open)
    }
}

impl Classify for CircuitOpen {
    fn kind(&self) -> ErrorKind {
        ErrorKind::ResourceExhausted
    }
}

impl<E: Classify> Classify for CircuitBreakerError<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            CircuitBreakerError::OpenCircuit(open) => open.kind(),
            CircuitBreakerError::Inner(e) => e.kind(),
        }
    }
}

impl<E> From<CircuitOpen> for ResilienceError<E> {
    fn from(open: CircuitOpen) -> Self {
        ResilienceError::CircuitOpen { name: open.name }
    }
}

impl<E> From<CircuitBreakerError<E>> for ResilienceError<E> {
    fn from(err: CircuitBreakerError<E>) -> Self {
        match err {
            CircuitBreakerError::OpenCircuit(open) => open.into(),
            CircuitBreakerError::Inner(e) => ResilienceError::Application(e),
        }
    }
}
