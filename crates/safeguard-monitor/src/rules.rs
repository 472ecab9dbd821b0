//! Detection rules and their fixed alert mapping.

use crate::alert::AlertType;
use safeguard_core::Severity;
use serde::Serialize;

/// A detection rule evaluated per operation over the detection window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Error rate at or above the high threshold.
    ErrorRateHigh,
    /// Error rate at or above the critical threshold. Supersedes `ErrorRateHigh`.
    ErrorRateCritical,
    /// One `(operation, kind)` signature repeated past the pattern threshold.
    RepeatedError,
    /// Failure count far above the operation's own baseline.
    Anomaly,
    /// Bulkhead rejections past the capacity threshold.
    CapacityRejections,
    /// Recovery attempts that failed.
    RecoveryFailures,
    /// Timeouts past the timeout threshold.
    Timeouts,
    /// Permission denials past the security threshold.
    PermissionDenials,
}

/// Rule to alert type and severity. Every rule appears exactly once.
pub const RULE_TABLE: [(Rule, AlertType, Severity); 8] = [
    (Rule::ErrorRateHigh, AlertType::ErrorRateHigh, Severity::High),
    (Rule::ErrorRateCritical, AlertType::ErrorRateCritical, Severity::Critical),
    (Rule::RepeatedError, AlertType::RepeatedError, Severity::Medium),
    (Rule::Anomaly, AlertType::AnomalyDetected, Severity::High),
    (Rule::CapacityRejections, AlertType::SystemDegradation, Severity::High),
    (Rule::RecoveryFailures, AlertType::RecoveryFailure, Severity::High),
    (Rule::Timeouts, AlertType::PerformanceImpact, Severity::Medium),
    (Rule::PermissionDenials, AlertType::SecurityConcern, Severity::Critical),
];

impl Rule {
    /// Alert type and severity this rule raises.
    pub fn alert(self) -> (AlertType, Severity) {
        match self {
            Rule::ErrorRateHigh => (AlertType::ErrorRateHigh, Severity::High),
            Rule::ErrorRateCritical => (AlertType::ErrorRateCritical, Severity::Critical),
            Rule::RepeatedError => (AlertType::RepeatedError, Severity::Medium),
            Rule::Anomaly => (AlertType::AnomalyDetected, Severity::High),
            Rule::CapacityRejections => (AlertType::SystemDegradation, Severity::High),
            Rule::RecoveryFailures => (AlertType::RecoveryFailure, Severity::High),
            Rule::Timeouts => (AlertType::PerformanceImpact, Severity::Medium),
            Rule::PermissionDenials => (AlertType::SecurityConcern, Severity::Critical),
        }
    }
}
