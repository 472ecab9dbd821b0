//! Error events recorded by the monitor.

use safeguard_core::{ErrorContext, ErrorKind, Severity};
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

/// What an [`ErrorEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// A terminal failure of a protected call.
    Failure,
    /// A caller turned away by a saturated bulkhead.
    CapacityRejection,
    /// A failure that a recovery strategy turned into a success.
    Recovered,
    /// A recovery attempt that did not succeed.
    RecoveryFailed,
}

/// One terminal outcome worth remembering. Immutable once created.
///
/// ```
/// use safeguard_core::{ErrorContext, ErrorKind, Severity};
/// use safeguard_monitor::{ErrorEvent, Signal};
///
/// let event = ErrorEvent::failure(ErrorKind::Timeout, ErrorContext::new("send_email"))
///     .with_message("smtp did not answer in 5s");
///
/// assert_eq!(event.signal(), Signal::Failure);
/// assert_eq!(event.severity(), Severity::Medium);
/// assert!(!event.recovery_attempted());
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    id: Uuid,
    signal: Signal,
    kind: ErrorKind,
    severity: Severity,
    message: String,
    context: ErrorContext,
    recovery_attempted: bool,
    recovery_successful: Option<bool>,
    #[serde(skip)]
    occurred_at: Instant,
}

impl ErrorEvent {
    fn new(signal: Signal, kind: ErrorKind, context: ErrorContext) -> Self {
        let (recovery_attempted, recovery_successful) = match signal {
            Signal::Recovered => (true, Some(true)),
            Signal::RecoveryFailed => (true, Some(false)),
            Signal::Failure | Signal::CapacityRejection => (false, None),
        };
        Self {
            id: Uuid::new_v4(),
            signal,
            kind,
            severity: kind.default_severity(),
            message: String::new(),
            context,
            recovery_attempted,
            recovery_successful,
            occurred_at: Instant::now(),
        }
    }

    /// A failed call, with severity derived from its kind.
    pub fn failure(kind: ErrorKind, context: ErrorContext) -> Self {
        Self::new(Signal::Failure, kind, context)
    }

    /// A bulkhead rejection. Counted apart from dependency failures.
    pub fn capacity_rejection(context: ErrorContext) -> Self {
        Self::new(Signal::CapacityRejection, ErrorKind::ResourceExhausted, context)
    }

    /// A failure of `kind` that a recovery strategy healed.
    pub fn recovered(kind: ErrorKind, context: ErrorContext) -> Self {
        Self::new(Signal::Recovered, kind, context)
    }

    /// A failure of `kind` that recovery could not heal.
    pub fn recovery_failed(kind: ErrorKind, context: ErrorContext) -> Self {
        let mut event = Self::new(Signal::RecoveryFailed, kind, context);
        event.severity = event.severity.max(Severity::High);
        event
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attaches a diagnostic message. Never shown to end users.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Overrides the occurrence instant, e.g. when replaying events.
    pub fn at(mut self, occurred_at: Instant) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    pub fn operation(&self) -> &str {
        self.context.operation()
    }

    pub fn recovery_attempted(&self) -> bool {
        self.recovery_attempted
    }

    pub fn recovery_successful(&self) -> Option<bool> {
        self.recovery_successful
    }

    pub fn occurred_at(&self) -> Instant {
        self.occurred_at
    }
}
