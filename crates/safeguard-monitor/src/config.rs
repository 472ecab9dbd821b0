//! Configuration for the error monitor.

use crate::alert::EscalationPolicy;
use crate::anomaly::{AnomalyDetector, MultiplierDetector};
use crate::sink::{SharedAlertSink, TracingAlertSink};
use safeguard_core::ConfigError;
use std::sync::Arc;
use std::time::Duration;

/// Per-window thresholds of the detection rules.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    /// Error rate raising `ERROR_RATE_HIGH`. Default: 0.10
    pub error_rate_high: f64,
    /// Error rate raising `ERROR_RATE_CRITICAL`. Default: 0.25
    pub error_rate_critical: f64,
    /// Finished calls needed before rates are judged. Default: 10
    pub min_requests: u64,
    /// Occurrences of one `(operation, kind)` raising `REPEATED_ERROR`. Default: 5
    pub repeated_error: u64,
    /// Failures needed before the anomaly detector is consulted. Default: 5
    pub anomaly_min_failures: u64,
    /// Bulkhead rejections raising `SYSTEM_DEGRADATION`. Default: 10
    pub capacity_rejections: u64,
    /// Failed recoveries raising `RECOVERY_FAILURE`. Default: 3
    pub recovery_failures: u64,
    /// Timeouts raising `PERFORMANCE_IMPACT`. Default: 5
    pub timeouts: u64,
    /// Permission denials raising `SECURITY_CONCERN`. Default: 5
    pub permission_denials: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            error_rate_high: 0.10,
            error_rate_critical: 0.25,
            min_requests: 10,
            repeated_error: 5,
            anomaly_min_failures: 5,
            capacity_rejections: 10,
            recovery_failures: 3,
            timeouts: 5,
            permission_denials: 5,
        }
    }
}

/// Configuration for an [`ErrorMonitor`](crate::ErrorMonitor).
#[derive(Clone)]
pub struct MonitorConfig {
    pub(crate) event_capacity: usize,
    pub(crate) shards: usize,
    pub(crate) bucket_width: Duration,
    pub(crate) detection_window: Duration,
    pub(crate) long_window: Duration,
    pub(crate) baseline_windows: usize,
    pub(crate) min_baseline_windows: usize,
    pub(crate) thresholds: Thresholds,
    pub(crate) cooldown: Duration,
    pub(crate) suppression_window: Duration,
    pub(crate) escalation: EscalationPolicy,
    pub(crate) detector: Arc<dyn AnomalyDetector>,
    pub(crate) sinks: Vec<SharedAlertSink>,
}

impl MonitorConfig {
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::new()
    }

    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }

    pub fn bucket_width(&self) -> Duration {
        self.bucket_width
    }

    pub fn detection_window(&self) -> Duration {
        self.detection_window
    }

    pub fn long_window(&self) -> Duration {
        self.long_window
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn detector(&self) -> &dyn AnomalyDetector {
        self.detector.as_ref()
    }

    pub(crate) fn buckets_in(&self, span: Duration) -> u64 {
        (span.as_nanos() / self.bucket_width.as_nanos()) as u64
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            event_capacity: 10_000,
            shards: 8,
            bucket_width: Duration::from_secs(60),
            detection_window: Duration::from_secs(5 * 60),
            long_window: Duration::from_secs(24 * 60 * 60),
            baseline_windows: 12,
            min_baseline_windows: 3,
            thresholds: Thresholds::default(),
            cooldown: Duration::from_secs(5 * 60),
            suppression_window: Duration::from_secs(5 * 60),
            escalation: EscalationPolicy::default(),
            detector: Arc::new(MultiplierDetector::default()),
            sinks: vec![Arc::new(TracingAlertSink)],
        }
    }
}

impl std::fmt::Debug for MonitorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorConfig")
            .field("event_capacity", &self.event_capacity)
            .field("bucket_width", &self.bucket_width)
            .field("detection_window", &self.detection_window)
            .field("long_window", &self.long_window)
            .field("thresholds", &self.thresholds)
            .field("cooldown", &self.cooldown)
            .field("detector", &self.detector.name())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Builder for [`MonitorConfig`].
pub struct MonitorConfigBuilder {
    config: MonitorConfig,
    cooldown: Option<Duration>,
    suppression_window: Option<Duration>,
    sinks: Vec<SharedAlertSink>,
}

impl MonitorConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: MonitorConfig::default(),
            cooldown: None,
            suppression_window: None,
            sinks: Vec::new(),
        }
    }

    /// Events kept for [`recent_events`](crate::ErrorMonitor::recent_events).
    ///
    /// Default: 10 000
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Number of independently locked event buffers.
    ///
    /// Default: 8
    pub fn shards(mut self, shards: usize) -> Self {
        self.config.shards = shards;
        self
    }

    /// Resolution of the sliding windows.
    ///
    /// Default: 1 minute
    pub fn bucket_width(mut self, width: Duration) -> Self {
        self.config.bucket_width = width;
        self
    }

    /// Window every rule is evaluated over.
    ///
    /// Default: 5 minutes
    pub fn detection_window(mut self, window: Duration) -> Self {
        self.config.detection_window = window;
        self
    }

    /// Long window reported in operation stats.
    ///
    /// Default: 24 hours
    pub fn long_window(mut self, window: Duration) -> Self {
        self.config.long_window = window;
        self
    }

    /// Prior detection windows forming the anomaly baseline.
    ///
    /// Default: 12
    pub fn baseline_windows(mut self, windows: usize) -> Self {
        self.config.baseline_windows = windows;
        self
    }

    /// Baseline windows of history required before anomalies are judged.
    ///
    /// Default: 3
    pub fn min_baseline_windows(mut self, windows: usize) -> Self {
        self.config.min_baseline_windows = windows;
        self
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    /// How long a condition must stay clear before its alert resolves.
    ///
    /// Default: the detection window
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    /// How recently an active alert must have been seen to absorb a duplicate.
    ///
    /// Default: the detection window
    pub fn suppression_window(mut self, window: Duration) -> Self {
        self.suppression_window = Some(window);
        self
    }

    pub fn escalation_policy(mut self, policy: EscalationPolicy) -> Self {
        self.config.escalation = policy;
        self
    }

    /// Replaces the anomaly detector.
    ///
    /// Default: [`MultiplierDetector`] at 3x the baseline mean
    pub fn anomaly_detector<D>(mut self, detector: D) -> Self
    where
        D: AnomalyDetector + 'static,
    {
        self.config.detector = Arc::new(detector);
        self
    }

    /// Adds an alert sink. Without any, alerts go to a [`TracingAlertSink`].
    pub fn sink(mut self, sink: SharedAlertSink) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn build(self) -> Result<MonitorConfig, ConfigError> {
        let mut config = self.config;
        config.cooldown = self.cooldown.unwrap_or(config.detection_window);
        config.suppression_window = self.suppression_window.unwrap_or(config.detection_window);
        if !self.sinks.is_empty() {
            config.sinks = self.sinks;
        }

        for (field, value) in [
            ("event_capacity", config.event_capacity),
            ("shards", config.shards),
            ("baseline_windows", config.baseline_windows),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        for (field, value) in [
            ("bucket_width", config.bucket_width),
            ("detection_window", config.detection_window),
            ("cooldown", config.cooldown),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Zero { field });
            }
        }
        if config.min_baseline_windows > config.baseline_windows {
            return Err(ConfigError::Inconsistent(
                "min_baseline_windows exceeds baseline_windows".into(),
            ));
        }
        for (field, window) in [
            ("detection_window", config.detection_window),
            ("long_window", config.long_window),
        ] {
            if window < config.bucket_width
                || window.as_nanos() % config.bucket_width.as_nanos() != 0
            {
                return Err(ConfigError::Inconsistent(format!(
                    "{field} must be a whole multiple of bucket_width"
                )));
            }
        }

        let t = &config.thresholds;
        for (field, count) in [
            ("repeated_error", t.repeated_error),
            ("timeouts", t.timeouts),
            ("permission_denials", t.permission_denials),
            ("capacity_rejections", t.capacity_rejections),
            ("recovery_failures", t.recovery_failures),
        ] {
            if count == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        for (field, rate) in [
            ("error_rate_high", t.error_rate_high),
            ("error_rate_critical", t.error_rate_critical),
        ] {
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(ConfigError::OutOfRange {
                    field,
                    range: "(0, 1]",
                    value: rate.to_string(),
                });
            }
        }
        if t.error_rate_high > t.error_rate_critical {
            return Err(ConfigError::Inconsistent(
                "error_rate_high exceeds error_rate_critical".into(),
            ));
        }
        Ok(config)
    }
}

impl Default for MonitorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
