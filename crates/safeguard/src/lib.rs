//! Composed protection for async operations.
//!
//! `safeguard` puts the individual mechanisms behind one call:
//!
//! - **Bulkhead** ([`safeguard_bulkhead`]) caps concurrent calls per resource
//! - **Circuit breaker** ([`safeguard_circuitbreaker`]) stops calling a failing dependency
//! - **Retry** ([`safeguard_retry`]) re-invokes transient failures with backoff
//! - **Timeout** bounds every single attempt
//! - **Fallback** serves an alternative result once everything else failed
//! - **Monitoring** ([`safeguard_monitor`]) sees one event per call and raises alerts
//!
//! [`Resilience`] owns the named breakers and bulkheads, the monitor and the
//! recovery manager. [`Resilience::protect`] runs an operation through them
//! in this order, outer to inner:
//!
//! ```text
//! bulkhead slot -> circuit admission -> retry loop -> timeout -> operation
//! ```
//!
//! A stage that refuses the call short-circuits everything inside it: a full
//! bulkhead never touches the breaker, an open circuit never runs the
//! operation. The bulkhead slot and the circuit admission are held for the
//! whole retry sequence, so one logical call occupies one slot.
//!
//! # Examples
//!
//! ```
//! use safeguard::{ProtectConfig, Resilience};
//! use safeguard_core::ErrorKind;
//! use safeguard_retry::{BackoffStrategy, RetryPolicy};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let resilience = Resilience::new();
//! let config = ProtectConfig::new("load_wallet")
//!     .circuit_breaker("db")
//!     .bulkhead("db_pool")
//!     .retry_policy(
//!         RetryPolicy::builder()
//!             .max_attempts(3)
//!             .strategy(BackoffStrategy::Fixed)
//!             .initial_delay(Duration::ZERO)
//!             .build()
//!             .unwrap(),
//!     )
//!     .timeout(Duration::from_secs(2));
//!
//! let calls = AtomicU32::new(0);
//! let balance = resilience
//!     .protect(&config, || async {
//!         if calls.fetch_add(1, Ordering::SeqCst) == 0 {
//!             Err(ErrorKind::ServiceUnavailable)
//!         } else {
//!             Ok(120)
//!         }
//!     })
//!     .await
//!     .unwrap();
//!
//! assert_eq!(balance, 120);
//! assert_eq!(resilience.health().monitoring.total_successes, 1);
//! # }
//! ```
//!
//! ## Alert evaluation
//!
//! Recording a failure only updates the monitor's windows. Alert rules run
//! on a background task that [`Resilience`] starts inside the tokio runtime
//! it is built in (or on its first protected call) and aborts when dropped.
//! The task evaluates once per monitor bucket width unless
//! [`ResilienceBuilder::evaluation_period`] says otherwise.
//! [`ResilienceBuilder::manual_evaluation`] turns it off, leaving
//! [`ErrorMonitor::evaluate`](safeguard_monitor::ErrorMonitor::evaluate) to
//! the caller.
//!
//! ## Feature Flags
//! - `metrics`: enables metrics in every mechanism using the `metrics` crate
//! - `tracing`: enables debug logging inside the primitives

mod config;
mod health;
mod messages;
mod wrapper;

pub use config::{BreakerSettings, BulkheadSettings, ConfigSource, StaticConfigSource};
pub use health::{BreakerHealth, HealthSnapshot, HealthStatus};
pub use messages::{CatalogEntry, MessageCatalog, UserFacingError};
pub use wrapper::{Fallback, ProtectConfig, ProtectError};

use safeguard_bulkhead::Bulkhead;
use safeguard_circuitbreaker::CircuitBreaker;
use safeguard_core::{ConfigError, Registry};
use safeguard_monitor::{ErrorMonitor, MonitorConfig};
use safeguard_recovery::RecoveryManager;
use safeguard_retry::{RetryEngine, RetryPolicy};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

static GLOBAL: OnceLock<Resilience> = OnceLock::new();

/// Process-wide home of named breakers and bulkheads, the error monitor and
/// the recovery manager.
///
/// Breakers and bulkheads are created on first use from the
/// [`ConfigSource`]. Two concurrent first lookups of one name share a single
/// instance.
pub struct Resilience {
    breakers: Registry<CircuitBreaker>,
    bulkheads: Registry<Bulkhead>,
    retry: RetryEngine,
    monitor: Arc<ErrorMonitor>,
    recovery: RecoveryManager,
    config: Arc<dyn ConfigSource>,
    messages: MessageCatalog,
    evaluation_period: Option<Duration>,
    evaluator: OnceLock<JoinHandle<()>>,
}

impl Resilience {
    /// Defaults everywhere: [`StaticConfigSource::default`],
    /// [`MonitorConfig::default`] and the default message catalog.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ResilienceBuilder {
        ResilienceBuilder::new()
    }

    /// The shared instance, created with defaults unless
    /// [`install_global`](Self::install_global) ran first.
    pub fn global() -> &'static Resilience {
        GLOBAL.get_or_init(Resilience::new)
    }

    /// Makes `resilience` the shared instance.
    ///
    /// Fails, handing the value back, once the shared instance exists.
    pub fn install_global(resilience: Resilience) -> Result<(), Resilience> {
        GLOBAL.set(resilience)
    }

    /// The breaker named `name`, created from the config source on first use.
    pub fn circuit_breaker(&self, name: &str) -> Result<CircuitBreaker, ConfigError> {
        if let Some(breaker) = self.breakers.get(name) {
            return Ok(CircuitBreaker::clone(&breaker));
        }
        let config = self.config.circuit_breaker_config(name).to_config(name)?;
        let breaker = self
            .breakers
            .get_or_create(name, || CircuitBreaker::new(config));
        Ok(CircuitBreaker::clone(&breaker))
    }

    /// Registers a breaker built elsewhere under its own name, replacing any
    /// previous one.
    pub fn register_circuit_breaker(&self, breaker: CircuitBreaker) {
        let name = breaker.name().to_string();
        if self.breakers.insert(&name, Arc::new(breaker)).is_some() {
            tracing::info!(breaker = %name, "replaced registered circuit breaker");
        }
    }

    /// The bulkhead named `name`, created from the config source on first use.
    pub fn bulkhead(&self, name: &str) -> Result<Bulkhead, ConfigError> {
        if let Some(bulkhead) = self.bulkheads.get(name) {
            return Ok(Bulkhead::clone(&bulkhead));
        }
        let config = self.config.bulkhead_config(name).to_config(name)?;
        let bulkhead = self.bulkheads.get_or_create(name, || Bulkhead::new(config));
        Ok(Bulkhead::clone(&bulkhead))
    }

    /// Registers a bulkhead built elsewhere under its own name, replacing any
    /// previous one.
    pub fn register_bulkhead(&self, bulkhead: Bulkhead) {
        let name = bulkhead.name().to_string();
        if self.bulkheads.insert(&name, Arc::new(bulkhead)).is_some() {
            tracing::info!(bulkhead = %name, "replaced registered bulkhead");
        }
    }

    /// Retry policy for a kind of operation, a single attempt when the
    /// config source has none.
    pub fn retry_policy(&self, operation_type: &str) -> RetryPolicy {
        self.config
            .retry_config(operation_type)
            .unwrap_or_else(RetryPolicy::no_retry)
    }

    pub fn retry_engine(&self) -> &RetryEngine {
        &self.retry
    }

    pub fn monitor(&self) -> &Arc<ErrorMonitor> {
        &self.monitor
    }

    /// Recovery manager reporting to this instance's monitor.
    pub fn recovery(&self) -> &RecoveryManager {
        &self.recovery
    }

    pub fn messages(&self) -> &MessageCatalog {
        &self.messages
    }

    pub fn config_source(&self) -> &dyn ConfigSource {
        self.config.as_ref()
    }

    /// Starts the background alert evaluator if it is enabled, not yet
    /// running, and a tokio runtime is current.
    ///
    /// Returns whether the evaluator is running afterwards.
    pub fn ensure_evaluator(&self) -> bool {
        let Some(period) = self.evaluation_period else {
            return false;
        };
        if self.evaluator.get().is_some() {
            return true;
        }
        if Handle::try_current().is_err() {
            return false;
        }
        self.evaluator.get_or_init(|| {
            tracing::debug!(period_ms = period.as_millis() as u64, "starting alert evaluator");
            self.monitor.spawn_evaluator(period)
        });
        true
    }

    /// Period of the background alert evaluator, `None` when evaluation is
    /// left to the caller.
    pub fn evaluation_period(&self) -> Option<Duration> {
        self.evaluation_period
    }

    /// Snapshot of every registered breaker and bulkhead plus recovery and
    /// monitoring counters.
    pub fn health(&self) -> HealthSnapshot {
        let breakers = self
            .breakers
            .snapshot()
            .iter()
            .map(|(_, breaker)| BreakerHealth::of(breaker))
            .collect();
        let bulkheads = self
            .bulkheads
            .snapshot()
            .iter()
            .map(|(_, bulkhead)| bulkhead.stats())
            .collect();
        HealthSnapshot::new(
            breakers,
            bulkheads,
            self.recovery.stats(),
            self.monitor.stats(),
        )
    }
}

impl Default for Resilience {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Resilience {
    fn drop(&mut self) {
        if let Some(evaluator) = self.evaluator.get() {
            evaluator.abort();
        }
    }
}

impl fmt::Debug for Resilience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resilience")
            .field("breakers", &self.breakers.names())
            .field("bulkheads", &self.bulkheads.names())
            .field("retry", &self.retry)
            .field("monitor", &self.monitor)
            .field("evaluation_period", &self.evaluation_period)
            .finish()
    }
}

/// Builder for [`Resilience`].
pub struct ResilienceBuilder {
    config: Arc<dyn ConfigSource>,
    monitor: Option<Arc<ErrorMonitor>>,
    monitor_config: MonitorConfig,
    retry: RetryEngine,
    messages: MessageCatalog,
    evaluation: Evaluation,
}

#[derive(Debug, Clone, Copy)]
enum Evaluation {
    EveryBucket,
    Every(Duration),
    Manual,
}

impl ResilienceBuilder {
    pub fn new() -> Self {
        Self {
            config: Arc::new(StaticConfigSource::default()),
            monitor: None,
            monitor_config: MonitorConfig::default(),
            retry: RetryEngine::default(),
            messages: MessageCatalog::default(),
            evaluation: Evaluation::EveryBucket,
        }
    }

    /// Where per-name breaker, bulkhead and retry settings come from.
    ///
    /// Default: [`StaticConfigSource::default`]
    pub fn config_source<C>(mut self, source: C) -> Self
    where
        C: ConfigSource + 'static,
    {
        self.config = Arc::new(source);
        self
    }

    /// Configuration of the monitor created by [`build`](Self::build).
    ///
    /// Ignored when [`monitor`](Self::monitor) supplies one.
    pub fn monitor_config(mut self, config: MonitorConfig) -> Self {
        self.monitor_config = config;
        self
    }

    /// Shares an existing monitor.
    pub fn monitor(mut self, monitor: Arc<ErrorMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Engine running the retry loop of every protected call.
    pub fn retry_engine(mut self, engine: RetryEngine) -> Self {
        self.retry = engine;
        self
    }

    pub fn messages(mut self, catalog: MessageCatalog) -> Self {
        self.messages = catalog;
        self
    }

    /// How often the background task evaluates alert rules.
    ///
    /// Default: the monitor's bucket width. A zero period means manual
    /// evaluation.
    pub fn evaluation_period(mut self, period: Duration) -> Self {
        self.evaluation = if period.is_zero() {
            Evaluation::Manual
        } else {
            Evaluation::Every(period)
        };
        self
    }

    /// Runs no background evaluator. Alerts are raised, escalated and
    /// resolved only when the caller invokes `ErrorMonitor::evaluate`.
    pub fn manual_evaluation(mut self) -> Self {
        self.evaluation = Evaluation::Manual;
        self
    }

    pub fn build(self) -> Resilience {
        let monitor = self
            .monitor
            .unwrap_or_else(|| Arc::new(ErrorMonitor::new(self.monitor_config)));
        let evaluation_period = match self.evaluation {
            Evaluation::EveryBucket => Some(monitor.config().bucket_width()),
            Evaluation::Every(period) => Some(period),
            Evaluation::Manual => None,
        };
        let recovery = RecoveryManager::new().with_monitor(Arc::clone(&monitor));
        let resilience = Resilience {
            breakers: Registry::new(),
            bulkheads: Registry::new(),
            retry: self.retry,
            monitor,
            recovery,
            config: self.config,
            messages: self.messages,
            evaluation_period,
            evaluator: OnceLock::new(),
        };
        resilience.ensure_evaluator();
        resilience
    }
}

impl Default for ResilienceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
