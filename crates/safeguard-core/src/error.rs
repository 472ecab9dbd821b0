//! Error taxonomy shared by every protective mechanism.
//!
//! Protection decisions (retry or not, trip the breaker or not, which alert
//! severity to attach) are made on an [`ErrorKind`], never on a concrete
//! error type. Caller error types opt in by implementing [`Classify`].
//!
//! | Kind | Retried | Trips breaker | Caller fault |
//! |---|---|---|---|
//! | `ServiceUnavailable` | yes | yes | no |
//! | `Timeout` | yes | yes | no |
//! | `Unknown` | only in retry-all mode | yes | no |
//! | `Conflict` | only in retry-all mode | no | no |
//! | `ResourceExhausted` | never | no | no |
//! | `ValidationFailure` | never | no | yes |
//! | `PermissionDenied` | never | no | yes |
//! | `NotFound` | never | no | yes |
//!
//! [`ResilienceError`] is the unified error returned by a composed call. Each
//! primitive crate converts its own error into it, so callers never write
//! `From` glue.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Rejected configuration, returned by every builder's `build()`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A count or duration that must be positive was zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Offending field.
        field: &'static str,
    },

    /// A value fell outside its permitted range.
    #[error("{field} must be in {range}, got {value}")]
    OutOfRange {
        /// Offending field.
        field: &'static str,
        /// Human-readable permitted range.
        range: &'static str,
        /// Rendered offending value.
        value: String,
    },

    /// Fields that are individually valid but inconsistent together.
    #[error("{0}")]
    Inconsistent(String),
}

/// Classification of a failure, independent of its concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A dependency is down or unreachable.
    ServiceUnavailable,
    /// A dependency did not answer in time.
    Timeout,
    /// The caller sent invalid input.
    ValidationFailure,
    /// The caller is not allowed to perform the operation.
    PermissionDenied,
    /// A bulkhead or circuit breaker refused the call.
    ResourceExhausted,
    /// The requested entity does not exist.
    NotFound,
    /// The operation conflicts with current state.
    Conflict,
    /// Anything not covered above.
    Unknown,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::ServiceUnavailable,
        ErrorKind::Timeout,
        ErrorKind::ValidationFailure,
        ErrorKind::PermissionDenied,
        ErrorKind::ResourceExhausted,
        ErrorKind::NotFound,
        ErrorKind::Conflict,
        ErrorKind::Unknown,
    ];

    /// Stable snake_case label used in logs, metrics and alert keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Caller-caused failures. These are never retried and never trip a breaker.
    pub fn is_caller_fault(&self) -> bool {
        matches!(
            self,
            ErrorKind::ValidationFailure | ErrorKind::PermissionDenied | ErrorKind::NotFound
        )
    }

    /// Whether a failure of this kind counts toward a circuit breaker's threshold.
    pub fn trips_circuit(&self) -> bool {
        matches!(
            self,
            ErrorKind::ServiceUnavailable | ErrorKind::Timeout | ErrorKind::Unknown
        )
    }

    /// Whether the default retry policy re-invokes an operation that failed this way.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::ServiceUnavailable | ErrorKind::Timeout)
    }

    /// Whether a retry engine must give up immediately, whatever the policy says.
    ///
    /// Rejections report saturation; retrying them on the spot makes it worse.
    pub fn is_never_retried(&self) -> bool {
        self.is_caller_fault() || *self == ErrorKind::ResourceExhausted
    }

    /// Severity attached to an error event of this kind.
    pub fn default_severity(&self) -> Severity {
        match self {
            ErrorKind::ServiceUnavailable => Severity::High,
            ErrorKind::PermissionDenied => Severity::High,
            ErrorKind::Timeout => Severity::Medium,
            ErrorKind::ResourceExhausted => Severity::Medium,
            ErrorKind::Unknown => Severity::Medium,
            ErrorKind::ValidationFailure => Severity::Low,
            ErrorKind::NotFound => Severity::Low,
            ErrorKind::Conflict => Severity::Low,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of an error event or alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational; no action needed.
    Low,
    /// Worth a look during business hours.
    Medium,
    /// User-visible degradation.
    High,
    /// Outage or security exposure.
    Critical,
}

impl Severity {
    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps an error onto the shared [`ErrorKind`] taxonomy.
///
/// # Example
///
/// ```
/// use safeguard_core::{Classify, ErrorKind};
///
/// #[derive(Debug)]
/// enum DbError {
///     ConnectionReset,
///     UniqueViolation,
/// }
///
/// impl Classify for DbError {
///     fn kind(&self) -> ErrorKind {
///         match self {
///             DbError::ConnectionReset => ErrorKind::ServiceUnavailable,
///             DbError::UniqueViolation => ErrorKind::Conflict,
///         }
///     }
/// }
///
/// assert!(DbError::ConnectionReset.kind().is_retryable());
/// assert!(!DbError::UniqueViolation.kind().trips_circuit());
/// ```
pub trait Classify {
    /// Returns the kind of this failure.
    fn kind(&self) -> ErrorKind;
}

impl Classify for ErrorKind {
    fn kind(&self) -> ErrorKind {
        *self
    }
}

impl Classify for std::io::Error {
    fn kind(&self) -> ErrorKind {
        use std::io::ErrorKind as Io;
        match std::io::Error::kind(self) {
            Io::TimedOut | Io::WouldBlock => ErrorKind::Timeout,
            Io::ConnectionRefused
            | Io::ConnectionReset
            | Io::ConnectionAborted
            | Io::NotConnected
            | Io::BrokenPipe
            | Io::AddrNotAvailable
            | Io::UnexpectedEof => ErrorKind::ServiceUnavailable,
            Io::PermissionDenied => ErrorKind::PermissionDenied,
            Io::NotFound => ErrorKind::NotFound,
            Io::InvalidInput | Io::InvalidData => ErrorKind::ValidationFailure,
            Io::AlreadyExists => ErrorKind::Conflict,
            Io::OutOfMemory => ErrorKind::ResourceExhausted,
            _ => ErrorKind::Unknown,
        }
    }
}

impl Classify for tokio::time::error::Elapsed {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Timeout
    }
}

impl<T: Classify + ?Sized> Classify for Box<T> {
    fn kind(&self) -> ErrorKind {
        (**self).kind()
    }
}

/// One failed attempt in a retry sequence, kept for diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptFailure {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// Rendered error message.
    pub message: String,
    /// Time spent in this attempt.
    pub elapsed: Duration,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempt {} failed after {:?} ({}): {}",
            self.attempt, self.elapsed, self.kind, self.message
        )
    }
}

/// Unified error type of a protected call.
///
/// # Example
///
/// ```
/// use safeguard_core::{Classify, ErrorKind, ResilienceError};
///
/// fn describe(error: &ResilienceError<std::io::Error>) -> &'static str {
///     match error {
///         ResilienceError::CircuitOpen { .. } => "dependency isolated",
///         ResilienceError::BulkheadFull { .. } => "pool saturated",
///         ResilienceError::Timeout { .. } => "too slow",
///         ResilienceError::RetryExhausted { .. } => "gave up",
///         ResilienceError::Application(_) => "operation failed",
///     }
/// }
///
/// let err: ResilienceError<std::io::Error> = ResilienceError::CircuitOpen { name: "db".into() };
/// assert_eq!(describe(&err), "dependency isolated");
/// assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
/// ```
#[derive(Debug, Clone)]
pub enum ResilienceError<E> {
    /// Circuit breaker is open, call rejected without touching the dependency.
    CircuitOpen {
        /// Circuit breaker name.
        name: String,
    },

    /// Bulkhead is at capacity and no slot freed within the wait bound.
    BulkheadFull {
        /// Bulkhead name.
        name: String,
        /// Configured capacity.
        capacity: usize,
    },

    /// A single attempt exceeded its time budget.
    Timeout {
        /// Operation that timed out.
        operation: String,
        /// Budget that elapsed.
        after: Duration,
    },

    /// Every permitted attempt failed.
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// One entry per failed attempt, oldest first.
        trail: Vec<AttemptFailure>,
        /// The final failure.
        last: Box<ResilienceError<E>>,
    },

    /// The protected operation itself returned an error.
    Application(E),
}

impl<E> fmt::Display for ResilienceError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResilienceError::CircuitOpen { name } => {
                write!(f, "circuit breaker '{}' is open", name)
            }
            ResilienceError::BulkheadFull { name, capacity } => {
                write!(f, "bulkhead '{}' is full ({} slots)", name, capacity)
            }
            ResilienceError::Timeout { operation, after } => {
                write!(f, "operation '{}' timed out after {:?}", operation, after)
            }
            ResilienceError::RetryExhausted { attempts, last, .. } => {
                write!(f, "gave up after {} attempts: {}", attempts, last)
            }
            ResilienceError::Application(e) => write!(f, "{}", e),
        }
    }
}

impl<E> std::error::Error for ResilienceError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResilienceError::Application(e) => Some(e),
            ResilienceError::RetryExhausted { last, .. } => Some(last.as_ref()),
            _ => None,
        }
    }
}

impl<E: Classify> Classify for ResilienceError<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            ResilienceError::CircuitOpen { .. } | ResilienceError::BulkheadFull { .. } => {
                ErrorKind::ResourceExhausted
            }
            ResilienceError::Timeout { .. } => ErrorKind::Timeout,
            ResilienceError::RetryExhausted { last, .. } => last.kind(),
            ResilienceError::Application(e) => e.kind(),
        }
    }
}

impl<E> ResilienceError<E> {
    /// Returns `true` if an attempt timed out, directly or as the last retry failure.
    pub fn is_timeout(&self) -> bool {
        match self {
            ResilienceError::Timeout { .. } => true,
            ResilienceError::RetryExhausted { last, .. } => last.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if a circuit breaker rejected the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    /// Returns `true` if a bulkhead rejected the call.
    pub fn is_bulkhead_full(&self) -> bool {
        matches!(self, ResilienceError::BulkheadFull { .. })
    }

    /// Returns `true` if the call was refused before reaching the dependency.
    pub fn is_rejection(&self) -> bool {
        self.is_circuit_open() || self.is_bulkhead_full()
    }

    /// Returns `true` if every retry attempt failed.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, ResilienceError::RetryExhausted { .. })
    }

    /// Returns `true` if this is an application error.
    pub fn is_application(&self) -> bool {
        matches!(self, ResilienceError::Application(_))
    }

    /// Number of attempts that ran before this error surfaced.
    pub fn attempts(&self) -> u32 {
        match self {
            ResilienceError::RetryExhausted { attempts, .. } => *attempts,
            ResilienceError::CircuitOpen { .. } | ResilienceError::BulkheadFull { .. } => 0,
            _ => 1,
        }
    }

    /// Extracts the application error, looking through an exhausted retry.
    pub fn application_error(self) -> Option<E> {
        match self {
            ResilienceError::Application(e) => Some(e),
            ResilienceError::RetryExhausted { last, .. } => last.application_error(),
            _ => None,
        }
    }

    /// Maps the application error using a function.
    ///
    /// ```
    /// use safeguard_core::ResilienceError;
    ///
    /// let err: ResilienceError<String> = ResilienceError::Application("error".to_string());
    /// let mapped: ResilienceError<usize> = err.map_application(|s| s.len());
    /// assert_eq!(mapped.application_error(), Some(5));
    /// ```
    pub fn map_application<F, T>(self, f: F) -> ResilienceError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            ResilienceError::CircuitOpen { name } => ResilienceError::CircuitOpen { name },
            ResilienceError::BulkheadFull { name, capacity } => {
                ResilienceError::BulkheadFull { name, capacity }
            }
            ResilienceError::Timeout { operation, after } => {
                ResilienceError::Timeout { operation, after }
            }
            ResilienceError::RetryExhausted {
                attempts,
                trail,
                last,
            } => ResilienceError::RetryExhausted {
                attempts,
                trail,
                last: Box::new(last.map_application(f)),
            },
            ResilienceError::Application(e) => ResilienceError::Application(f(e)),
        }
    }
}
