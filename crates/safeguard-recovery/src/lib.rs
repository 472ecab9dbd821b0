//! Explicit second-chance recovery for failed operations.
//!
//! Transport-level retries live in `safeguard-retry`. A [`RecoveryManager`]
//! is for domain code that wants a deliberate recovery path after those are
//! spent, such as reconnecting to a database and redoing a read, or
//! answering with a degraded result.
//!
//! Strategies are named and pluggable:
//!
//! | Name | Strategy | Before each attempt |
//! |------|----------|---------------------|
//! | `immediate_retry` | [`ImmediateRetry`] | nothing |
//! | `exponential_backoff` | [`ExponentialBackoffRecovery`] | sleeps the backoff delay |
//! | `graceful_degradation` | [`GracefulDegradation`] | abandons, so the degraded path answers |
//! | (registered by you) | [`CircuitBreakerAware`] | waits out an open breaker |
//! | (registered by you) | [`ExternalRestart`] | calls a restart hook |
//!
//! # Examples
//!
//! ```
//! use safeguard_core::{ErrorContext, ErrorKind};
//! use safeguard_recovery::{Recovery, RecoveryManager};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let manager = RecoveryManager::new();
//! let ctx = ErrorContext::new("load_dashboard");
//!
//! let widgets = manager
//!     .recover_or_degrade(
//!         &ErrorKind::ServiceUnavailable,
//!         &ctx,
//!         "immediate_retry",
//!         |_attempt| async { Err::<Vec<String>, _>(ErrorKind::ServiceUnavailable) },
//!         2,
//!         || async { vec!["cached".to_string()] },
//!     )
//!     .await;
//!
//! assert!(widgets.is_degraded());
//! assert_eq!(manager.stats().total_recoveries, 1);
//! # }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: enables metrics collection using the `metrics` crate

mod error;
mod manager;
mod strategy;

pub use error::RecoveryError;
pub use manager::{Recovery, RecoveryManager, RecoveryStats, StrategyStats};
pub use strategy::{
    CircuitBreakerAware, ExponentialBackoffRecovery, ExternalRestart, GracefulDegradation,
    ImmediateRetry, Preparation, RecoveryStrategy, SharedRecoveryStrategy,
};
