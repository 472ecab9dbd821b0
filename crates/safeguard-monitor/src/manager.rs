//! Alert lifecycle: deduplication, escalation, resolution.
//!
//! ```text
//!   raise ──▶ OPEN ──acknowledge──▶ ACKNOWLEDGED
//!              │  ╲                      │
//!              │   suppress──▶ SUPPRESSED│
//!              │                  │      │
//!              └──── cooldown or resolve ┴──▶ RESOLVED
//! ```
//!
//! Only OPEN alerts escalate. Re-raising an active `(type, operation)` merges
//! into the existing alert and refreshes its last-seen instant; an alert
//! whose condition has not been seen for the cooldown resolves on the next
//! sweep. A raise after resolution starts a fresh alert.

use crate::alert::{Alert, AlertKey, AlertState, AlertType, EscalationPolicy};
use crate::sink::SharedAlertSink;
#[cfg(feature = "metrics")]
use metrics::counter;
use safeguard_core::Severity;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Errors from administrative alert actions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlertError {
    #[error("alert {0} not found")]
    NotFound(Uuid),
    #[error("cannot {action} alert {id}: it is {state}")]
    InvalidTransition {
        id: Uuid,
        state: AlertState,
        action: &'static str,
    },
}

/// What happened to a raise request.
#[derive(Debug, Clone, PartialEq)]
pub enum RaiseOutcome {
    /// A new alert was opened and dispatched.
    Raised(Alert),
    /// An active alert for the same condition absorbed the report.
    Merged(Uuid),
}

impl RaiseOutcome {
    pub fn id(&self) -> Uuid {
        match self {
            RaiseOutcome::Raised(alert) => alert.id,
            RaiseOutcome::Merged(id) => *id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, RaiseOutcome::Raised(_))
    }
}

/// Changes applied by one sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub escalated: Vec<Uuid>,
    pub resolved: Vec<Uuid>,
}

/// Lifetime counters of an alert manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertStats {
    pub raised: u64,
    pub merged: u64,
    pub escalations: u64,
    pub resolved: u64,
    pub active: usize,
}

struct AlertBook {
    active: HashMap<AlertKey, Alert>,
    history: VecDeque<Alert>,
    stats: AlertStats,
}

impl AlertBook {
    fn find_mut(&mut self, id: Uuid) -> Option<&mut Alert> {
        self.active.values_mut().find(|alert| alert.id == id)
    }

    fn retire(&mut self, key: &AlertKey, now: Instant, limit: usize) -> Option<Uuid> {
        let mut alert = self.active.remove(key)?;
        alert.state = AlertState::Resolved;
        alert.resolved_at = Some(now);
        self.stats.resolved += 1;
        let id = alert.id;
        if self.history.len() == limit {
            self.history.pop_front();
        }
        self.history.push_back(alert);
        Some(id)
    }
}

/// Owns every alert and its escalation timer.
pub struct AlertManager {
    book: Mutex<AlertBook>,
    policy: EscalationPolicy,
    cooldown: Duration,
    suppression_window: Duration,
    history_limit: usize,
    sinks: Vec<SharedAlertSink>,
}

impl AlertManager {
    /// `cooldown`: how long a condition must stay clear before its alert
    /// resolves. `suppression_window`: how recently an active alert must have
    /// been seen to absorb a duplicate.
    pub fn new(
        policy: EscalationPolicy,
        cooldown: Duration,
        suppression_window: Duration,
        sinks: Vec<SharedAlertSink>,
    ) -> Self {
        Self {
            book: Mutex::new(AlertBook {
                active: HashMap::new(),
                history: VecDeque::new(),
                stats: AlertStats::default(),
            }),
            policy,
            cooldown,
            suppression_window,
            history_limit: 1000,
            sinks,
        }
    }

    fn book(&self) -> MutexGuard<'_, AlertBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, alert: &Alert) {
        for sink in &self.sinks {
            sink.send_alert(alert);
        }
    }

    pub fn escalation_policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Reports that a condition holds at `now`.
    pub fn raise(
        &self,
        alert_type: AlertType,
        severity: Severity,
        operation: &str,
        message: impl Into<String>,
        now: Instant,
    ) -> RaiseOutcome {
        let key = AlertKey {
            alert_type,
            operation: operation.to_string(),
        };

        let alert = {
            let mut guard = self.book();
            let book = &mut *guard;
            let stale = match book.active.get_mut(&key) {
                Some(existing)
                    if now.saturating_duration_since(existing.last_seen_at)
                        <= self.suppression_window =>
                {
                    existing.occurrences += 1;
                    existing.last_seen_at = now;
                    existing.severity = existing.severity.max(severity);
                    let id = existing.id;
                    book.stats.merged += 1;
                    return RaiseOutcome::Merged(id);
                }
                Some(_) => true,
                None => false,
            };
            if stale {
                book.retire(&key, now, self.history_limit);
            }

            let alert = Alert::new(alert_type, severity, operation, message.into(), now);
            book.active.insert(key, alert.clone());
            book.stats.raised += 1;
            alert
        };

        tracing::info!(
            alert_id = %alert.id,
            alert_type = %alert.alert_type,
            severity = %alert.severity,
            operation = %alert.operation,
            "alert raised"
        );
        #[cfg(feature = "metrics")]
        counter!(
            "alerts_raised_total",
            "type" => alert.alert_type.as_str(),
            "severity" => alert.severity.as_str()
        )
        .increment(1);

        self.dispatch(&alert);
        RaiseOutcome::Raised(alert)
    }

    /// Escalates overdue OPEN alerts and resolves alerts whose condition has
    /// been clear for the cooldown.
    pub fn sweep(&self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        let mut escalated = Vec::new();
        {
            let mut book = self.book();

            let cleared: Vec<AlertKey> = book
                .active
                .iter()
                .filter(|(_, alert)| {
                    now.saturating_duration_since(alert.last_seen_at) >= self.cooldown
                })
                .map(|(key, _)| key.clone())
                .collect();
            for key in cleared {
                if let Some(id) = book.retire(&key, now, self.history_limit) {
                    tracing::info!(
                        alert_id = %id,
                        alert_type = %key.alert_type,
                        operation = %key.operation,
                        "alert resolved after cooldown"
                    );
                    report.resolved.push(id);
                }
            }

            for alert in book.active.values_mut() {
                if alert.state != AlertState::Open {
                    continue;
                }
                let target = self
                    .policy
                    .level_after(now.saturating_duration_since(alert.raised_at));
                if target > alert.escalation_level {
                    alert.escalation_level = target;
                    alert.last_escalated_at = now;
                    report.escalated.push(alert.id);
                    escalated.push(alert.clone());
                }
            }
            book.stats.escalations += escalated.len() as u64;
        }

        for alert in &escalated {
            tracing::info!(
                alert_id = %alert.id,
                alert_type = %alert.alert_type,
                operation = %alert.operation,
                level = alert.escalation_level,
                "alert escalated"
            );
            #[cfg(feature = "metrics")]
            counter!("alerts_escalated_total", "level" => alert.escalation_level.to_string())
                .increment(1);
            self.dispatch(alert);
        }
        #[cfg(feature = "metrics")]
        counter!("alerts_resolved_total").increment(report.resolved.len() as u64);

        report
    }

    /// Stops escalation of an OPEN or SUPPRESSED alert.
    pub fn acknowledge(&self, id: Uuid, now: Instant) -> Result<(), AlertError> {
        let mut book = self.book();
        let alert = book.find_mut(id).ok_or(AlertError::NotFound(id))?;
        match alert.state {
            AlertState::Open | AlertState::Suppressed => {
                alert.state = AlertState::Acknowledged;
                alert.acknowledged_at = Some(now);
                tracing::info!(alert_id = %id, "alert acknowledged");
                Ok(())
            }
            state => Err(AlertError::InvalidTransition {
                id,
                state,
                action: "acknowledge",
            }),
        }
    }

    /// Silences an active alert: no escalation, no dispatch, still deduplicating.
    pub fn suppress(&self, id: Uuid) -> Result<(), AlertError> {
        let mut book = self.book();
        let alert = book.find_mut(id).ok_or(AlertError::NotFound(id))?;
        match alert.state {
            AlertState::Open | AlertState::Acknowledged => {
                alert.state = AlertState::Suppressed;
                tracing::info!(alert_id = %id, "alert suppressed");
                Ok(())
            }
            state => Err(AlertError::InvalidTransition {
                id,
                state,
                action: "suppress",
            }),
        }
    }

    /// Resolves an active alert by hand.
    pub fn resolve(&self, id: Uuid, now: Instant) -> Result<(), AlertError> {
        let mut book = self.book();
        let key = match book.active.iter().find(|(_, alert)| alert.id == id) {
            Some((key, _)) => key.clone(),
            None if book.history.iter().any(|alert| alert.id == id) => {
                return Err(AlertError::InvalidTransition {
                    id,
                    state: AlertState::Resolved,
                    action: "resolve",
                })
            }
            None => return Err(AlertError::NotFound(id)),
        };
        book.retire(&key, now, self.history_limit);
        tracing::info!(alert_id = %id, "alert resolved");
        Ok(())
    }

    /// Looks up an alert, active or resolved.
    pub fn get(&self, id: Uuid) -> Option<Alert> {
        let book = self.book();
        book.active
            .values()
            .find(|alert| alert.id == id)
            .or_else(|| book.history.iter().rev().find(|alert| alert.id == id))
            .cloned()
    }

    /// Active alerts, oldest first.
    pub fn active_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.book().active.values().cloned().collect();
        alerts.sort_by_key(|alert| alert.raised_at);
        alerts
    }

    /// Up to `limit` resolved alerts, newest first.
    pub fn history(&self, limit: usize) -> Vec<Alert> {
        self.book().history.iter().rev().take(limit).cloned().collect()
    }

    pub fn stats(&self) -> AlertStats {
        let book = self.book();
        AlertStats {
            active: book.active.len(),
            ..book.stats
        }
    }
}

impl std::fmt::Debug for AlertManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertManager")
            .field("policy", &self.policy)
            .field("cooldown", &self.cooldown)
            .field("suppression_window", &self.suppression_window)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
