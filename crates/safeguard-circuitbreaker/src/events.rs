use crate::CircuitState;
use safeguard_core::{ErrorKind, ResilienceEvent};
use tokio::time::Instant;

/// Events emitted by a circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// A call was admitted.
    CallPermitted {
        source: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was rejected because the circuit is open or its probe slots are taken.
    CallRejected {
        source: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// The breaker moved between states.
    StateTransition {
        source: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A successful call was recorded.
    SuccessRecorded {
        source: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A failure that counts toward the threshold was recorded.
    FailureRecorded {
        source: String,
        timestamp: Instant,
        state: CircuitState,
        kind: ErrorKind,
    },
    /// A failure the classifier does not count, such as a validation error.
    FailureIgnored {
        source: String,
        timestamp: Instant,
        kind: ErrorKind,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
            CircuitBreakerEvent::FailureIgnored { .. } => "failure_ignored",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureIgnored { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            CircuitBreakerEvent::CallPermitted { source, .. }
            | CircuitBreakerEvent::CallRejected { source, .. }
            | CircuitBreakerEvent::StateTransition { source, .. }
            | CircuitBreakerEvent::SuccessRecorded { source, .. }
            | CircuitBreakerEvent::FailureRecorded { source, .. }
            | CircuitBreakerEvent::FailureIgnored { source, .. } => source,
        }
    }
}
