use safeguard_core::{ErrorKind, ResilienceEvent};
use std::time::Duration;
use tokio::time::Instant;

/// Events emitted by a retry engine.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// An attempt failed and another one is scheduled after `delay`.
    Retry {
        source: String,
        timestamp: Instant,
        /// The attempt that just failed, 1-based.
        attempt: u32,
        kind: ErrorKind,
        delay: Duration,
    },
    /// The operation succeeded, on the first attempt or after retries.
    Success {
        source: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// Every permitted attempt failed.
    Exhausted {
        source: String,
        timestamp: Instant,
        attempts: u32,
        kind: ErrorKind,
    },
    /// An attempt failed with a kind the policy does not retry.
    Ignored {
        source: String,
        timestamp: Instant,
        attempt: u32,
        kind: ErrorKind,
    },
}

impl ResilienceEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::Ignored { .. } => "ignored",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::Ignored { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            RetryEvent::Retry { source, .. }
            | RetryEvent::Success { source, .. }
            | RetryEvent::Exhausted { source, .. }
            | RetryEvent::Ignored { source, .. } => source,
        }
    }
}
