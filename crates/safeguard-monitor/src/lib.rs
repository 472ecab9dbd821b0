//! Error monitoring and alerting for protected operations.
//!
//! An [`ErrorMonitor`] receives one [`ErrorEvent`] per terminal outcome of a
//! protected call and keeps:
//!
//! - a bounded, sharded buffer of recent events
//! - per-operation sliding windows of minute buckets
//! - lifetime counters
//!
//! Each evaluation runs a fixed set of rules over the detection window
//! (five minutes by default) and hands breaches to the [`AlertManager`]:
//!
//! | Condition | Alert | Severity |
//! |-----------|-------|----------|
//! | error rate >= critical threshold | `ERROR_RATE_CRITICAL` | critical |
//! | error rate >= high threshold | `ERROR_RATE_HIGH` | high |
//! | one `(operation, kind)` repeated | `REPEATED_ERROR` | medium |
//! | failures far above the baseline | `ANOMALY_DETECTED` | high |
//! | bulkhead rejections | `SYSTEM_DEGRADATION` | high |
//! | failed recoveries | `RECOVERY_FAILURE` | high |
//! | timeouts | `PERFORMANCE_IMPACT` | medium |
//! | permission denials | `SECURITY_CONCERN` | critical |
//!
//! Alerts are deduplicated per `(type, operation)`, escalate through four
//! levels while unacknowledged, and resolve once their condition has been
//! clear for the cooldown.
//!
//! # Examples
//!
//! ```
//! use safeguard_core::{ErrorContext, ErrorKind};
//! use safeguard_monitor::{AlertType, ErrorEvent, ErrorMonitor, MonitorConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let monitor = ErrorMonitor::new(MonitorConfig::default());
//! let ctx = ErrorContext::new("charge_card");
//!
//! for _ in 0..7 {
//!     monitor.record_success(&ctx);
//! }
//! for _ in 0..3 {
//!     monitor.record(ErrorEvent::failure(ErrorKind::ServiceUnavailable, ctx.clone()));
//! }
//!
//! let evaluation = monitor.evaluate();
//! assert_eq!(evaluation.raised[0].alert_type, AlertType::ErrorRateCritical);
//! # }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: enables metrics collection using the `metrics` crate

mod alert;
mod anomaly;
mod config;
mod event;
mod manager;
mod monitor;
mod pattern;
mod rules;
mod sink;
mod store;
mod window;

pub use alert::{Alert, AlertKey, AlertState, AlertType, EscalationPolicy};
pub use anomaly::{Anomaly, AnomalyDetector, EwmaDetector, MultiplierDetector, ZScoreDetector};
pub use config::{MonitorConfig, MonitorConfigBuilder, Thresholds};
pub use event::{ErrorEvent, Signal};
pub use manager::{AlertError, AlertManager, AlertStats, RaiseOutcome, SweepReport};
pub use monitor::{ErrorMonitor, Evaluation, MonitorStats, OperationStats};
pub use pattern::{signature, ErrorPattern};
pub use rules::{Rule, RULE_TABLE};
pub use sink::{AlertSink, ChannelAlertSink, SharedAlertSink, TracingAlertSink};
pub use window::WindowCounts;
