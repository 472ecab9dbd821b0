//! Alert values and the escalation schedule.

use safeguard_core::{ConfigError, Severity};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Condition an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    ErrorRateHigh,
    ErrorRateCritical,
    AnomalyDetected,
    RepeatedError,
    SystemDegradation,
    RecoveryFailure,
    PerformanceImpact,
    SecurityConcern,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::ErrorRateHigh => "ERROR_RATE_HIGH",
            AlertType::ErrorRateCritical => "ERROR_RATE_CRITICAL",
            AlertType::AnomalyDetected => "ANOMALY_DETECTED",
            AlertType::RepeatedError => "REPEATED_ERROR",
            AlertType::SystemDegradation => "SYSTEM_DEGRADATION",
            AlertType::RecoveryFailure => "RECOVERY_FAILURE",
            AlertType::PerformanceImpact => "PERFORMANCE_IMPACT",
            AlertType::SecurityConcern => "SECURITY_CONCERN",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    Open,
    Acknowledged,
    Resolved,
    Suppressed,
}

impl AlertState {
    /// Whether the alert still tracks a live condition.
    pub fn is_active(&self) -> bool {
        !matches!(self, AlertState::Resolved)
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AlertState::Open => "open",
            AlertState::Acknowledged => "acknowledged",
            AlertState::Resolved => "resolved",
            AlertState::Suppressed => "suppressed",
        })
    }
}

/// An alert raised for one `(type, operation)` condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub state: AlertState,
    pub operation: String,
    pub message: String,
    /// 1 to 4.
    pub escalation_level: u8,
    /// Times the condition was reported while this alert was active.
    pub occurrences: u64,
    #[serde(skip)]
    pub raised_at: Instant,
    #[serde(skip)]
    pub last_escalated_at: Instant,
    /// Last time the triggering condition was observed.
    #[serde(skip)]
    pub last_seen_at: Instant,
    #[serde(skip)]
    pub acknowledged_at: Option<Instant>,
    #[serde(skip)]
    pub resolved_at: Option<Instant>,
}

impl Alert {
    pub(crate) fn new(
        alert_type: AlertType,
        severity: Severity,
        operation: &str,
        message: String,
        now: Instant,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            state: AlertState::Open,
            operation: operation.to_string(),
            message,
            escalation_level: 1,
            occurrences: 1,
            raised_at: now,
            last_escalated_at: now,
            last_seen_at: now,
            acknowledged_at: None,
            resolved_at: None,
        }
    }

    pub fn key(&self) -> AlertKey {
        AlertKey {
            alert_type: self.alert_type,
            operation: self.operation.clone(),
        }
    }
}

/// Deduplication key of an alert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlertKey {
    pub alert_type: AlertType,
    pub operation: String,
}

/// Offsets from `raised_at` at which an unacknowledged alert reaches each level.
///
/// Default: level 1 immediately, level 2 after 30 minutes, level 3 after 60
/// minutes, level 4 after 120 minutes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationPolicy {
    offsets: [Duration; 4],
}

impl EscalationPolicy {
    pub const MAX_LEVEL: u8 = 4;

    /// Offsets must start at zero and be non-decreasing.
    pub fn new(offsets: [Duration; 4]) -> Result<Self, ConfigError> {
        if !offsets[0].is_zero() {
            return Err(ConfigError::Inconsistent(
                "escalation level 1 must fire immediately".into(),
            ));
        }
        if offsets.windows(2).any(|w| w[1] < w[0]) {
            return Err(ConfigError::Inconsistent(
                "escalation offsets must be non-decreasing".into(),
            ));
        }
        Ok(Self { offsets })
    }

    pub fn offsets(&self) -> &[Duration; 4] {
        &self.offsets
    }

    /// Level an unacknowledged alert should be at after `elapsed`.
    pub fn level_after(&self, elapsed: Duration) -> u8 {
        self.offsets.iter().filter(|offset| elapsed >= **offset).count() as u8
    }

    /// When an alert at `level` reaches the next one, if there is one.
    pub fn next_escalation(&self, raised_at: Instant, level: u8) -> Option<Instant> {
        self.offsets
            .get(usize::from(level))
            .map(|offset| raised_at + *offset)
    }
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            offsets: [
                Duration::ZERO,
                Duration::from_secs(30 * 60),
                Duration::from_secs(60 * 60),
                Duration::from_secs(120 * 60),
            ],
        }
    }
}
