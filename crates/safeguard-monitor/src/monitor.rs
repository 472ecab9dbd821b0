use crate::alert::Alert;
use crate::anomaly::Anomaly;
use crate::config::MonitorConfig;
use crate::event::{ErrorEvent, Signal};
use crate::manager::{AlertManager, RaiseOutcome, SweepReport};
use crate::pattern::ErrorPattern;
use crate::rules::Rule;
use crate::store::EventStore;
use crate::window::{OperationWindow, WindowCounts};
use dashmap::DashMap;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use safeguard_core::{ErrorContext, ErrorKind};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Lifetime counters plus a view of the current detection window.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStats {
    pub total_errors: u64,
    pub total_successes: u64,
    pub capacity_rejections: u64,
    pub recovered: u64,
    pub recovery_failures: u64,
    /// Failures across all operations inside the detection window.
    pub recent_errors_in_window: u64,
    /// Failures over finished calls inside the detection window.
    pub error_rate: f64,
    pub events_stored: usize,
    pub active_alerts: Vec<Alert>,
}

/// Window counts of one operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationStats {
    pub operation: String,
    /// Over the detection window.
    pub recent: WindowCounts,
    /// Over the long window.
    pub long: WindowCounts,
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Alerts opened by this pass.
    pub raised: Vec<Alert>,
    /// Conditions absorbed by alerts that were already active.
    pub merged: usize,
    pub sweep: SweepReport,
}

#[derive(Default)]
struct Totals {
    errors: AtomicU64,
    successes: AtomicU64,
    capacity_rejections: AtomicU64,
    recovered: AtomicU64,
    recovery_failures: AtomicU64,
}

impl Totals {
    fn clear(&self) {
        for counter in [
            &self.errors,
            &self.successes,
            &self.capacity_rejections,
            &self.recovered,
            &self.recovery_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

struct Finding {
    rule: Rule,
    operation: String,
    message: String,
}

/// Collects terminal outcomes of protected calls and turns sustained
/// conditions into alerts.
///
/// Recording is cheap and lock-light: the event lands in a sharded buffer and
/// the operation's bucket ring. Rules only run in [`evaluate`](Self::evaluate),
/// either called directly or from the task started by
/// [`spawn_evaluator`](Self::spawn_evaluator).
pub struct ErrorMonitor {
    config: MonitorConfig,
    store: EventStore,
    windows: DashMap<String, OperationWindow>,
    totals: Totals,
    alerts: AlertManager,
    epoch: Instant,
    window_buckets: u64,
    retention: u64,
}

impl ErrorMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "monitor_errors_total",
                    "Total number of failures recorded by the error monitor"
                );
                describe_counter!(
                    "monitor_capacity_rejections_total",
                    "Total number of bulkhead rejections recorded by the error monitor"
                );
                describe_counter!(
                    "monitor_recoveries_total",
                    "Total number of recovery outcomes recorded by the error monitor"
                );
            });
        }

        let window_buckets = config.buckets_in(config.detection_window).max(1);
        let baseline_span = window_buckets * (config.baseline_windows as u64 + 1);
        let retention = config.buckets_in(config.long_window).max(baseline_span);
        let alerts = AlertManager::new(
            config.escalation.clone(),
            config.cooldown,
            config.suppression_window,
            config.sinks.clone(),
        );

        Self {
            store: EventStore::new(config.event_capacity, config.shards),
            windows: DashMap::new(),
            totals: Totals::default(),
            alerts,
            epoch: Instant::now(),
            window_buckets,
            retention,
            config,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    fn bucket_at(&self, at: Instant) -> u64 {
        let elapsed = at.saturating_duration_since(self.epoch);
        (elapsed.as_nanos() / self.config.bucket_width.as_nanos()) as u64
    }

    fn window_range(&self, current: u64) -> (u64, u64) {
        (current.saturating_sub(self.window_buckets - 1), current)
    }

    fn with_window<R>(&self, operation: &str, f: impl FnOnce(&mut OperationWindow) -> R) -> R {
        if let Some(mut window) = self.windows.get_mut(operation) {
            return f(&mut window);
        }
        let mut window = self
            .windows
            .entry(operation.to_string())
            .or_insert_with(|| OperationWindow::new(self.retention));
        f(&mut window)
    }

    /// Records a terminal outcome.
    pub fn record(&self, event: ErrorEvent) {
        let index = self.bucket_at(event.occurred_at());
        self.with_window(event.operation(), |window| {
            window.record(index, event.signal(), event.kind())
        });

        match event.signal() {
            Signal::Failure => {
                self.totals.errors.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    operation = event.operation(),
                    kind = event.kind().as_str(),
                    severity = event.severity().as_str(),
                    correlation_id = event.context().correlation_id(),
                    "failure recorded"
                );
                #[cfg(feature = "metrics")]
                counter!(
                    "monitor_errors_total",
                    "operation" => event.operation().to_string(),
                    "kind" => event.kind().as_str()
                )
                .increment(1);
            }
            Signal::CapacityRejection => {
                self.totals.capacity_rejections.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(operation = event.operation(), "capacity rejection recorded");
                #[cfg(feature = "metrics")]
                counter!(
                    "monitor_capacity_rejections_total",
                    "operation" => event.operation().to_string()
                )
                .increment(1);
            }
            Signal::Recovered => {
                self.totals.recovered.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    operation = event.operation(),
                    kind = event.kind().as_str(),
                    "recovery recorded"
                );
                #[cfg(feature = "metrics")]
                counter!("monitor_recoveries_total", "outcome" => "recovered").increment(1);
            }
            Signal::RecoveryFailed => {
                self.totals.recovery_failures.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    operation = event.operation(),
                    kind = event.kind().as_str(),
                    "failed recovery recorded"
                );
                #[cfg(feature = "metrics")]
                counter!("monitor_recoveries_total", "outcome" => "failed").increment(1);
            }
        }

        self.store.push(event);
    }

    /// Records a successful call. Successes feed error rates but are not stored.
    pub fn record_success(&self, context: &ErrorContext) {
        let index = self.bucket_at(Instant::now());
        self.with_window(context.operation(), |window| window.record_success(index));
        self.totals.successes.fetch_add(1, Ordering::Relaxed);
    }

    /// Shorthand for recording a plain failure.
    pub fn record_failure(&self, kind: ErrorKind, context: ErrorContext, message: impl Into<String>) {
        self.record(ErrorEvent::failure(kind, context).with_message(message));
    }

    /// Runs every rule against the current window, raises or refreshes the
    /// matching alerts, then escalates and resolves.
    pub fn evaluate(&self) -> Evaluation {
        self.evaluate_at(Instant::now())
    }

    pub fn evaluate_at(&self, now: Instant) -> Evaluation {
        let current = self.bucket_at(now);
        self.windows.retain(|_, window| {
            window.prune(current);
            !window.is_empty()
        });

        // Findings are collected before raising so no map shard is locked
        // while sinks run.
        let mut findings = Vec::new();
        for entry in self.windows.iter() {
            self.check(entry.key(), entry.value(), current, &mut findings);
        }

        let mut evaluation = Evaluation::default();
        for finding in findings {
            let (alert_type, severity) = finding.rule.alert();
            match self
                .alerts
                .raise(alert_type, severity, &finding.operation, finding.message, now)
            {
                RaiseOutcome::Raised(alert) => evaluation.raised.push(alert),
                RaiseOutcome::Merged(_) => evaluation.merged += 1,
            }
        }
        evaluation.sweep = self.alerts.sweep(now);
        evaluation
    }

    fn check(
        &self,
        operation: &str,
        window: &OperationWindow,
        current: u64,
        findings: &mut Vec<Finding>,
    ) {
        let t = &self.config.thresholds;
        let (from, to) = self.window_range(current);
        let counts = window.counts(from, to);
        let mut found = |rule: Rule, message: String| {
            findings.push(Finding {
                rule,
                operation: operation.to_string(),
                message,
            })
        };

        if counts.total() >= t.min_requests {
            let rate = counts.error_rate();
            let rule = if rate >= t.error_rate_critical {
                Some(Rule::ErrorRateCritical)
            } else if rate >= t.error_rate_high {
                Some(Rule::ErrorRateHigh)
            } else {
                None
            };
            if let Some(rule) = rule {
                found(
                    rule,
                    format!(
                        "{operation}: error rate {:.1}% over {} calls",
                        rate * 100.0,
                        counts.total()
                    ),
                );
            }
        }

        if let Some((kind, count)) = counts
            .by_kind
            .iter()
            .filter(|(_, count)| **count >= t.repeated_error)
            .max_by_key(|(_, count)| **count)
        {
            found(
                Rule::RepeatedError,
                format!("{operation}: {count} {kind} failures in the detection window"),
            );
        }

        if counts.failures >= t.anomaly_min_failures {
            if let Some(anomaly) = self.detect_anomaly(window, current, counts.failures) {
                found(
                    Rule::Anomaly,
                    format!(
                        "{operation}: {} failures against a baseline of {:.1} ({} score {:.2})",
                        anomaly.current, anomaly.baseline, anomaly.detector, anomaly.score
                    ),
                );
            }
        }

        if counts.capacity_rejections >= t.capacity_rejections {
            found(
                Rule::CapacityRejections,
                format!("{operation}: {} calls rejected at capacity", counts.capacity_rejections),
            );
        }
        if counts.recovery_failures >= t.recovery_failures {
            found(
                Rule::RecoveryFailures,
                format!("{operation}: {} recovery attempts failed", counts.recovery_failures),
            );
        }
        let timeouts = counts.count_of(ErrorKind::Timeout);
        if timeouts >= t.timeouts {
            found(Rule::Timeouts, format!("{operation}: {timeouts} timeouts"));
        }
        let denials = counts.count_of(ErrorKind::PermissionDenied);
        if denials >= t.permission_denials {
            found(
                Rule::PermissionDenials,
                format!("{operation}: {denials} permission denials"),
            );
        }
    }

    /// Compares the current window against up to `baseline_windows` full
    /// windows before it. Skipped until enough history exists.
    fn detect_anomaly(&self, window: &OperationWindow, current: u64, failures: u64) -> Option<Anomaly> {
        let width = self.window_buckets;
        let history = ((current + 1) / width).saturating_sub(1);
        let available = history.min(self.config.baseline_windows as u64);
        if available < self.config.min_baseline_windows as u64 {
            return None;
        }

        let baseline: Vec<f64> = (1..=available)
            .rev()
            .map(|back| {
                let to = current - back * width;
                window.counts(to + 1 - width, to).failures as f64
            })
            .collect();
        self.config.detector.detect(failures as f64, &baseline)
    }

    /// `(operation, kind)` signatures at or above the pattern threshold in the
    /// current window, most frequent first.
    pub fn patterns(&self) -> Vec<ErrorPattern> {
        let now = Instant::now();
        let (from, to) = self.window_range(self.bucket_at(now));
        let window_start = now
            .checked_sub(self.config.detection_window)
            .unwrap_or(self.epoch);
        let threshold = self.config.thresholds.repeated_error;

        let mut patterns: Vec<ErrorPattern> = self
            .windows
            .iter()
            .flat_map(|entry| {
                let counts = entry.value().counts(from, to);
                let operation = entry.key().clone();
                counts
                    .by_kind
                    .into_iter()
                    .filter(move |(_, count)| *count >= threshold)
                    .map(move |(kind, count)| {
                        ErrorPattern::new(&operation, kind, count, window_start, now)
                    })
            })
            .collect();
        patterns.sort_by(|a, b| {
            b.occurrence_count
                .cmp(&a.occurrence_count)
                .then_with(|| a.operation.cmp(&b.operation))
        });
        patterns
    }

    pub fn stats(&self) -> MonitorStats {
        let (from, to) = self.window_range(self.bucket_at(Instant::now()));
        let mut failures = 0;
        let mut finished = 0;
        for entry in self.windows.iter() {
            let counts = entry.value().counts(from, to);
            failures += counts.failures;
            finished += counts.total();
        }

        MonitorStats {
            total_errors: self.totals.errors.load(Ordering::Relaxed),
            total_successes: self.totals.successes.load(Ordering::Relaxed),
            capacity_rejections: self.totals.capacity_rejections.load(Ordering::Relaxed),
            recovered: self.totals.recovered.load(Ordering::Relaxed),
            recovery_failures: self.totals.recovery_failures.load(Ordering::Relaxed),
            recent_errors_in_window: failures,
            error_rate: if finished == 0 {
                0.0
            } else {
                failures as f64 / finished as f64
            },
            events_stored: self.store.len(),
            active_alerts: self.alerts.active_alerts(),
        }
    }

    /// Counts for one operation, if it has recorded anything still retained.
    pub fn operation_stats(&self, operation: &str) -> Option<OperationStats> {
        let current = self.bucket_at(Instant::now());
        let window = self.windows.get(operation)?;
        let (from, to) = self.window_range(current);
        let long_from = current.saturating_sub(self.config.buckets_in(self.config.long_window) - 1);
        Some(OperationStats {
            operation: operation.to_string(),
            recent: window.counts(from, to),
            long: window.counts(long_from, current),
        })
    }

    /// Up to `limit` stored events, newest first.
    pub fn recent_events(&self, limit: usize) -> Vec<ErrorEvent> {
        self.store.recent(limit)
    }

    /// Forgets recorded events, windows and counters. Alerts are kept.
    pub fn reset(&self) {
        self.store.clear();
        self.windows.clear();
        self.totals.clear();
        tracing::info!("error monitor reset");
    }

    /// Evaluates every `period` on a background task.
    ///
    /// The task holds only a weak reference and stops once the monitor is
    /// dropped. Ticks missed while an evaluation runs long are skipped.
    pub fn spawn_evaluator(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let monitor: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(monitor) = monitor.upgrade() else {
                    break;
                };
                let evaluation = monitor.evaluate();
                if !evaluation.raised.is_empty() {
                    tracing::debug!(raised = evaluation.raised.len(), "evaluation raised alerts");
                }
            }
        })
    }
}

impl Default for ErrorMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl std::fmt::Debug for ErrorMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorMonitor")
            .field("config", &self.config)
            .field("operations", &self.windows.len())
            .field("events_stored", &self.store.len())
            .finish()
    }
}
