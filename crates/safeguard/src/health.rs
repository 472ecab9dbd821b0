//! Health snapshot for dashboards and health endpoints.

use safeguard_bulkhead::BulkheadStats;
use safeguard_circuitbreaker::{CircuitBreaker, CircuitState};
use safeguard_core::Severity;
use safeguard_monitor::MonitorStats;
use safeguard_recovery::RecoveryStats;
use serde::Serialize;

/// Overall verdict of a [`HealthSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    /// A breaker is probing or an alert is active.
    Degraded,
    /// A breaker is open or a critical alert is active.
    Unhealthy,
}

/// Counters of one named breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerHealth {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: usize,
    pub success_count: u64,
    pub rejected_count: u64,
}

impl BreakerHealth {
    pub(crate) fn of(breaker: &CircuitBreaker) -> Self {
        let metrics = breaker.metrics();
        Self {
            name: breaker.name().to_string(),
            state: metrics.state,
            failure_count: metrics.failure_count,
            success_count: metrics.success_count,
            rejected_count: metrics.rejected_count,
        }
    }
}

/// Point-in-time view of every registered mechanism.
///
/// Reads are snapshots taken one after another, not one atomic cut.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    /// Sorted by name.
    pub breakers: Vec<BreakerHealth>,
    /// Sorted by name.
    pub bulkheads: Vec<BulkheadStats>,
    pub recovery: RecoveryStats,
    pub monitoring: MonitorStats,
}

impl HealthSnapshot {
    pub(crate) fn new(
        mut breakers: Vec<BreakerHealth>,
        mut bulkheads: Vec<BulkheadStats>,
        recovery: RecoveryStats,
        monitoring: MonitorStats,
    ) -> Self {
        breakers.sort_by(|a, b| a.name.cmp(&b.name));
        bulkheads.sort_by(|a, b| a.name.cmp(&b.name));
        let status = status_of(&breakers, &monitoring);
        Self {
            status,
            breakers,
            bulkheads,
            recovery,
            monitoring,
        }
    }

    pub fn breaker(&self, name: &str) -> Option<&BreakerHealth> {
        self.breakers.iter().find(|b| b.name == name)
    }

    pub fn bulkhead(&self, name: &str) -> Option<&BulkheadStats> {
        self.bulkheads.iter().find(|b| b.name == name)
    }
}

fn status_of(breakers: &[BreakerHealth], monitoring: &MonitorStats) -> HealthStatus {
    let breaker_status = breakers
        .iter()
        .map(|b| match b.state {
            CircuitState::Closed => HealthStatus::Healthy,
            CircuitState::HalfOpen => HealthStatus::Degraded,
            CircuitState::Open => HealthStatus::Unhealthy,
        })
        .max()
        .unwrap_or(HealthStatus::Healthy);

    let alert_status = monitoring
        .active_alerts
        .iter()
        .map(|a| {
            if a.severity == Severity::Critical {
                HealthStatus::Unhealthy
            } else {
                HealthStatus::Degraded
            }
        })
        .max()
        .unwrap_or(HealthStatus::Healthy);

    breaker_status.max(alert_status)
}
