//! Configuration for the bulkhead pattern.

use crate::events::BulkheadEvent;
use safeguard_core::{BoxedEventListener, ConfigError, EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a bulkhead.
#[derive(Clone)]
pub struct BulkheadConfig {
    /// Maximum number of slots held at once.
    pub(crate) capacity: usize,
    /// Wait bound used by [`Bulkhead::enter`](crate::Bulkhead::enter); `None` waits forever.
    pub(crate) max_wait_duration: Option<Duration>,
    /// Name of this bulkhead instance.
    pub(crate) name: String,
    /// Event listeners.
    pub(crate) event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_wait_duration(&self) -> Option<Duration> {
        self.max_wait_duration
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for BulkheadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkheadConfig")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("max_wait_duration", &self.max_wait_duration)
            .finish()
    }
}

/// Builder for bulkhead configuration.
pub struct BulkheadConfigBuilder {
    capacity: usize,
    max_wait_duration: Option<Duration>,
    name: String,
    event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            capacity: 25,
            max_wait_duration: None,
            name: "bulkhead".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the maximum number of concurrent slots.
    ///
    /// Default: 25
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the maximum time to queue for a slot.
    ///
    /// If `None`, callers wait until a slot frees. `Some(Duration::ZERO)`
    /// rejects immediately when full.
    ///
    /// Default: None
    pub fn max_wait_duration(mut self, duration: Option<Duration>) -> Self {
        self.max_wait_duration = duration;
        self
    }

    /// Sets the name of this bulkhead instance.
    ///
    /// Default: "bulkhead"
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a shared listener receiving every event of this bulkhead.
    pub fn listener(mut self, listener: BoxedEventListener<BulkheadEvent>) -> Self {
        self.event_listeners.add_shared(listener);
        self
    }

    /// Registers a callback when a slot is granted.
    ///
    /// # Callback Signature
    /// `Fn(usize)` - called with the number of slots in use after the grant,
    /// between 1 and the capacity.
    ///
    /// # Example
    /// ```rust
    /// use safeguard_bulkhead::BulkheadConfig;
    ///
    /// let config = BulkheadConfig::builder()
    ///     .capacity(10)
    ///     .on_call_permitted(|active| {
    ///         if active >= 8 {
    ///             eprintln!("db_pool nearly saturated: {active}/10");
    ///         }
    ///     })
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.capacity(), 10);
    /// ```
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallPermitted { active_count, .. } = event {
                f(*active_count);
            }
        }));
        self
    }

    /// Registers a callback when a caller is turned away, with the configured capacity.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallRejected { capacity, .. } = event {
                f(*capacity);
            }
        }));
        self
    }

    /// Registers a callback when a slot is released, with how long it was held.
    pub fn on_slot_released<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::SlotReleased { held_for, .. } = event {
                f(*held_for);
            }
        }));
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<BulkheadConfig, ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Zero { field: "capacity" });
        }
        if self.capacity > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(ConfigError::OutOfRange {
                field: "capacity",
                range: "[1, Semaphore::MAX_PERMITS]",
                value: self.capacity.to_string(),
            });
        }

        Ok(BulkheadConfig {
            capacity: self.capacity,
            max_wait_duration: self.max_wait_duration,
            name: self.name,
            event_listeners: self.event_listeners,
        })
    }
}

impl Default for BulkheadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
