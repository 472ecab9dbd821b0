use crate::classifier::{DefaultClassifier, FnClassifier, SharedFailureClassifier};
use crate::events::CircuitBreakerEvent;
use crate::CircuitState;
use safeguard_core::{BoxedEventListener, ConfigError, ErrorKind, EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a circuit breaker.
pub struct CircuitBreakerConfig {
    pub(crate) name: String,
    pub(crate) failure_threshold: u32,
    pub(crate) recovery_timeout: Duration,
    pub(crate) half_open_trial_limit: u32,
    pub(crate) failure_window: Duration,
    pub(crate) classifier: SharedFailureClassifier,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }

    pub fn half_open_trial_limit(&self) -> u32 {
        self.half_open_trial_limit
    }

    pub fn failure_window(&self) -> Duration {
        self.failure_window
    }
}

impl std::fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("name", &self.name)
            .field("failure_threshold", &self.failure_threshold)
            .field("recovery_timeout", &self.recovery_timeout)
            .field("half_open_trial_limit", &self.half_open_trial_limit)
            .field("failure_window", &self.failure_window)
            .field("event_listeners", &self.event_listeners)
            .finish()
    }
}

/// Builder for configuring and constructing a circuit breaker.
pub struct CircuitBreakerConfigBuilder {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    half_open_trial_limit: u32,
    failure_window: Duration,
    classifier: SharedFailureClassifier,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_trial_limit: 1,
            failure_window: Duration::from_secs(60),
            classifier: Arc::new(DefaultClassifier),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name used in events, logs and metrics.
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Sets the number of counted failures within the window that opens the circuit.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Sets how long the circuit stays open after the last failure before probing.
    ///
    /// Default: 60 seconds
    pub fn recovery_timeout(mut self, duration: Duration) -> Self {
        self.recovery_timeout = duration;
        self
    }

    /// Sets the number of concurrent probes admitted while half-open.
    ///
    /// The same number of consecutive probe successes closes the circuit.
    ///
    /// Default: 1
    pub fn half_open_trial_limit(mut self, n: u32) -> Self {
        self.half_open_trial_limit = n;
        self
    }

    /// Sets the window failures are counted in. Older failures no longer count.
    ///
    /// Default: 60 seconds
    pub fn failure_window(mut self, duration: Duration) -> Self {
        self.failure_window = duration;
        self
    }

    /// Sets a closure deciding which error kinds count as failures.
    ///
    /// Default: [`ErrorKind::trips_circuit`]
    pub fn failure_classifier<F>(mut self, f: F) -> Self
    where
        F: Fn(ErrorKind) -> bool + Send + Sync + 'static,
    {
        self.classifier = Arc::new(FnClassifier::new(f));
        self
    }

    /// Adds a shared listener receiving every event of this breaker.
    pub fn listener(mut self, listener: BoxedEventListener<CircuitBreakerEvent>) -> Self {
        self.event_listeners.add_shared(listener);
        self
    }

    /// Registers a callback for state transitions, called with `(from, to)`.
    ///
    /// # Example
    /// ```rust
    /// use safeguard_circuitbreaker::{CircuitBreakerConfig, CircuitState};
    ///
    /// let config = CircuitBreakerConfig::builder()
    ///     .name("db")
    ///     .on_state_transition(|from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("db circuit opened (was {:?})", from);
    ///         }
    ///     })
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.name(), "db");
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback when a call is admitted, with the state it was admitted in.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallPermitted { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback when a call is rejected.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    /// Registers a callback when a success is recorded.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::SuccessRecorded { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback when a counted failure is recorded.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, ErrorKind) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::FailureRecorded { state, kind, .. } = event {
                    f(*state, *kind);
                }
            }));
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<CircuitBreakerConfig, ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Zero {
                field: "failure_threshold",
            });
        }
        if self.half_open_trial_limit == 0 {
            return Err(ConfigError::Zero {
                field: "half_open_trial_limit",
            });
        }
        if self.failure_window.is_zero() {
            return Err(ConfigError::Zero {
                field: "failure_window",
            });
        }

        Ok(CircuitBreakerConfig {
            name: self.name,
            failure_threshold: self.failure_threshold,
            recovery_timeout: self.recovery_timeout,
            half_open_trial_limit: self.half_open_trial_limit,
            failure_window: self.failure_window,
            classifier: self.classifier,
            event_listeners: self.event_listeners,
        })
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
