//! Alert delivery.
//!
//! The monitor decides that and when an alert fires; sinks decide where it
//! goes. Delivery is fire-and-forget: a sink must not block and its failures
//! never reach the code that raised the alert.

use crate::alert::Alert;
use safeguard_core::Severity;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Destination for raised and escalated alerts.
pub trait AlertSink: Send + Sync {
    fn send_alert(&self, alert: &Alert);
}

/// Type alias for shared sinks.
pub type SharedAlertSink = Arc<dyn AlertSink>;

impl<F> AlertSink for F
where
    F: Fn(&Alert) + Send + Sync,
{
    fn send_alert(&self, alert: &Alert) {
        self(alert)
    }
}

/// Logs every alert through `tracing`. Critical alerts log at `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn send_alert(&self, alert: &Alert) {
        if alert.severity == Severity::Critical {
            tracing::error!(
                alert_id = %alert.id,
                alert_type = %alert.alert_type,
                severity = %alert.severity,
                operation = %alert.operation,
                level = alert.escalation_level,
                "{}",
                alert.message
            );
        } else {
            tracing::warn!(
                alert_id = %alert.id,
                alert_type = %alert.alert_type,
                severity = %alert.severity,
                operation = %alert.operation,
                level = alert.escalation_level,
                "{}",
                alert.message
            );
        }
    }
}

/// Forwards alerts to a bounded channel drained by an external notifier.
///
/// When the channel is full or closed the alert is dropped and a warning is
/// logged.
#[derive(Debug, Clone)]
pub struct ChannelAlertSink {
    sender: mpsc::Sender<Alert>,
}

impl ChannelAlertSink {
    /// Creates a sink and the receiver a notifier task should drain.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Alert>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }

    pub fn from_sender(sender: mpsc::Sender<Alert>) -> Self {
        Self { sender }
    }
}

impl AlertSink for ChannelAlertSink {
    fn send_alert(&self, alert: &Alert) {
        match self.sender.try_send(alert.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(alert)) => {
                tracing::warn!(alert_id = %alert.id, "alert channel full, dropping alert");
            }
            Err(TrySendError::Closed(alert)) => {
                tracing::warn!(alert_id = %alert.id, "alert channel closed, dropping alert");
            }
        }
    }
}
