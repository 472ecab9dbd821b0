//! Event types for the bulkhead pattern.

use safeguard_core::ResilienceEvent;
use std::time::Duration;
use tokio::time::Instant;

/// Events emitted by a bulkhead.
#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A slot was granted.
    CallPermitted {
        /// Name of the bulkhead instance.
        source: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Slots in use after this grant.
        active_count: usize,
        /// Time spent queued before the grant.
        waited: Duration,
    },
    /// No slot freed up within the wait bound.
    CallRejected {
        /// Name of the bulkhead instance.
        source: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Configured capacity.
        capacity: usize,
        /// Time spent queued before giving up.
        waited: Duration,
    },
    /// A slot was released.
    SlotReleased {
        /// Name of the bulkhead instance.
        source: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the slot was held.
        held_for: Duration,
    },
}

impl ResilienceEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BulkheadEvent::CallPermitted { .. } => "call_permitted",
            BulkheadEvent::CallRejected { .. } => "call_rejected",
            BulkheadEvent::SlotReleased { .. } => "slot_released",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BulkheadEvent::CallPermitted { timestamp, .. }
            | BulkheadEvent::CallRejected { timestamp, .. }
            | BulkheadEvent::SlotReleased { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            BulkheadEvent::CallPermitted { source, .. }
            | BulkheadEvent::CallRejected { source, .. }
            | BulkheadEvent::SlotReleased { source, .. } => source,
        }
    }
}
