//! Per-name settings for the mechanisms `protect()` resolves by name.
//!
//! The surrounding application owns the real configuration. It plugs in
//! through [`ConfigSource`]; [`StaticConfigSource`] covers tests and small
//! deployments with fixed defaults plus per-name overrides.

use safeguard_bulkhead::BulkheadConfig;
use safeguard_circuitbreaker::CircuitBreakerConfig;
use safeguard_core::ConfigError;
use safeguard_retry::RetryPolicy;
use std::collections::HashMap;
use std::time::Duration;

/// Thresholds of one named circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub half_open_trial_limit: u32,
    pub failure_window: Duration,
}

impl BreakerSettings {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            ..Self::default()
        }
    }

    /// Builds the breaker configuration for `name`.
    pub fn to_config(&self, name: &str) -> Result<CircuitBreakerConfig, ConfigError> {
        CircuitBreakerConfig::builder()
            .name(name)
            .failure_threshold(self.failure_threshold)
            .recovery_timeout(self.recovery_timeout)
            .half_open_trial_limit(self.half_open_trial_limit)
            .failure_window(self.failure_window)
            .build()
    }
}

impl Default for BreakerSettings {
    /// Five failures within a minute, sixty seconds open, one probe.
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_trial_limit: 1,
            failure_window: Duration::from_secs(60),
        }
    }
}

/// Capacity and wait bound of one named bulkhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkheadSettings {
    pub capacity: usize,
    /// How long a caller queues for a slot. `None` waits until one frees.
    pub timeout: Option<Duration>,
}

impl BulkheadSettings {
    pub fn new(capacity: usize, timeout: Option<Duration>) -> Self {
        Self { capacity, timeout }
    }

    /// Builds the bulkhead configuration for `name`.
    pub fn to_config(&self, name: &str) -> Result<BulkheadConfig, ConfigError> {
        BulkheadConfig::builder()
            .name(name)
            .capacity(self.capacity)
            .max_wait_duration(self.timeout)
            .build()
    }
}

impl Default for BulkheadSettings {
    /// Ten slots, five seconds of queueing.
    fn default() -> Self {
        Self {
            capacity: 10,
            timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// External lookup of per-name settings.
///
/// Called once per name, on first use; later changes need an explicit
/// re-registration on [`Resilience`](crate::Resilience).
pub trait ConfigSource: Send + Sync {
    fn circuit_breaker_config(&self, service: &str) -> BreakerSettings;

    fn bulkhead_config(&self, resource: &str) -> BulkheadSettings;

    /// Retry policy for a kind of operation. `None` means a single attempt.
    fn retry_config(&self, operation_type: &str) -> Option<RetryPolicy>;
}

/// Fixed defaults plus per-name overrides.
///
/// ```
/// use safeguard::{BreakerSettings, BulkheadSettings, ConfigSource, StaticConfigSource};
/// use std::time::Duration;
///
/// let source = StaticConfigSource::new()
///     .breaker("payments", BreakerSettings::new(3, Duration::from_secs(30)))
///     .bulkhead("db_pool", BulkheadSettings::new(2, Some(Duration::ZERO)));
///
/// assert_eq!(source.circuit_breaker_config("payments").failure_threshold, 3);
/// assert_eq!(source.circuit_breaker_config("search").failure_threshold, 5);
/// assert_eq!(source.bulkhead_config("db_pool").capacity, 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    default_breaker: BreakerSettings,
    breakers: HashMap<String, BreakerSettings>,
    default_bulkhead: BulkheadSettings,
    bulkheads: HashMap<String, BulkheadSettings>,
    default_retry: Option<RetryPolicy>,
    retries: HashMap<String, RetryPolicy>,
}

impl StaticConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for breakers without an override.
    pub fn default_breaker(mut self, settings: BreakerSettings) -> Self {
        self.default_breaker = settings;
        self
    }

    pub fn breaker(mut self, service: impl Into<String>, settings: BreakerSettings) -> Self {
        self.breakers.insert(service.into(), settings);
        self
    }

    /// Settings for bulkheads without an override.
    pub fn default_bulkhead(mut self, settings: BulkheadSettings) -> Self {
        self.default_bulkhead = settings;
        self
    }

    pub fn bulkhead(mut self, resource: impl Into<String>, settings: BulkheadSettings) -> Self {
        self.bulkheads.insert(resource.into(), settings);
        self
    }

    /// Policy for operation types without an override.
    pub fn default_retry(mut self, policy: RetryPolicy) -> Self {
        self.default_retry = Some(policy);
        self
    }

    pub fn retry(mut self, operation_type: impl Into<String>, policy: RetryPolicy) -> Self {
        self.retries.insert(operation_type.into(), policy);
        self
    }
}

impl ConfigSource for StaticConfigSource {
    fn circuit_breaker_config(&self, service: &str) -> BreakerSettings {
        self.breakers
            .get(service)
            .copied()
            .unwrap_or(self.default_breaker)
    }

    fn bulkhead_config(&self, resource: &str) -> BulkheadSettings {
        self.bulkheads
            .get(resource)
            .copied()
            .unwrap_or(self.default_bulkhead)
    }

    fn retry_config(&self, operation_type: &str) -> Option<RetryPolicy> {
        self.retries
            .get(operation_type)
            .or(self.default_retry.as_ref())
            .cloned()
    }
}
