use safeguard_core::{ErrorContext, ErrorKind};
use safeguard_monitor::{
    Alert, AlertState, AlertType, ChannelAlertSink, ErrorEvent, ErrorMonitor, MonitorConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const MINUTE: Duration = Duration::from_secs(60);

fn monitor() -> (ErrorMonitor, mpsc::Receiver<Alert>) {
    let (sink, receiver) = ChannelAlertSink::new(32);
    let config = MonitorConfig::builder()
        .cooldown(Duration::from_secs(4 * 60 * 60))
        .suppression_window(Duration::from_secs(4 * 60 * 60))
        .sink(Arc::new(sink))
        .build()
        .unwrap();
    (ErrorMonitor::new(config), receiver)
}

fn drain(receiver: &mut mpsc::Receiver<Alert>, alert_type: AlertType) -> Vec<Alert> {
    let mut alerts = Vec::new();
    while let Ok(alert) = receiver.try_recv() {
        if alert.alert_type == alert_type {
            alerts.push(alert);
        }
    }
    alerts
}

fn fail(monitor: &ErrorMonitor, operation: &str, kind: ErrorKind, n: usize) {
    let context = ErrorContext::new(operation);
    for _ in 0..n {
        monitor.record(ErrorEvent::failure(kind, context.clone()).with_message("upstream refused"));
    }
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_alert_escalates_through_the_sink() {
    let (monitor, mut receiver) = monitor();
    fail(&monitor, "charge_card", ErrorKind::ServiceUnavailable, 10);

    monitor.evaluate();
    let raised = drain(&mut receiver, AlertType::ErrorRateCritical);
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].escalation_level, 1);
    assert_eq!(raised[0].operation, "charge_card");

    tokio::time::advance(29 * MINUTE).await;
    monitor.evaluate();
    assert!(drain(&mut receiver, AlertType::ErrorRateCritical).is_empty());

    tokio::time::advance(MINUTE).await;
    monitor.evaluate();
    let escalated = drain(&mut receiver, AlertType::ErrorRateCritical);
    assert_eq!(escalated.len(), 1);
    assert_eq!(escalated[0].id, raised[0].id);
    assert_eq!(escalated[0].escalation_level, 2);
}

#[tokio::test(start_paused = true)]
async fn acknowledged_alert_stops_escalating() {
    let (monitor, mut receiver) = monitor();
    fail(&monitor, "charge_card", ErrorKind::ServiceUnavailable, 10);

    monitor.evaluate();
    let id = drain(&mut receiver, AlertType::ErrorRateCritical)[0].id;
    monitor.alerts().acknowledge(id, Instant::now()).unwrap();

    tokio::time::advance(3 * 60 * MINUTE).await;
    monitor.evaluate();
    assert!(drain(&mut receiver, AlertType::ErrorRateCritical).is_empty());

    let alert = monitor.alerts().get(id).unwrap();
    assert_eq!(alert.state, AlertState::Acknowledged);
    assert_eq!(alert.escalation_level, 1);

    // The unacknowledged repeated-error alert kept climbing.
    let repeated = monitor
        .alerts()
        .active_alerts()
        .into_iter()
        .find(|a| a.alert_type == AlertType::RepeatedError)
        .unwrap();
    assert_eq!(repeated.escalation_level, 4);
}

#[tokio::test(start_paused = true)]
async fn suppressed_alert_stays_silent_but_deduplicates() {
    let (monitor, mut receiver) = monitor();
    fail(&monitor, "export", ErrorKind::Timeout, 6);

    monitor.evaluate();
    let id = drain(&mut receiver, AlertType::PerformanceImpact)[0].id;
    monitor.alerts().suppress(id).unwrap();

    tokio::time::advance(2 * MINUTE).await;
    fail(&monitor, "export", ErrorKind::Timeout, 6);
    let evaluation = monitor.evaluate();
    assert!(evaluation
        .raised
        .iter()
        .all(|a| a.alert_type != AlertType::PerformanceImpact));

    tokio::time::advance(60 * MINUTE).await;
    monitor.evaluate();
    assert!(drain(&mut receiver, AlertType::PerformanceImpact).is_empty());
    assert_eq!(monitor.alerts().get(id).unwrap().occurrences, 2);
}

#[tokio::test(start_paused = true)]
async fn repeated_failures_show_up_as_a_pattern() {
    let (monitor, _receiver) = monitor();
    fail(&monitor, "db_read", ErrorKind::Timeout, 6);
    fail(&monitor, "db_read", ErrorKind::NotFound, 2);

    let patterns = monitor.patterns();
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].operation, "db_read");
    assert_eq!(patterns[0].kind, ErrorKind::Timeout);
    assert_eq!(patterns[0].occurrence_count, 6);

    let recent = monitor.recent_events(3);
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].kind(), ErrorKind::NotFound);
}
