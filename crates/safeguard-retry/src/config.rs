use crate::events::RetryEvent;
use safeguard_core::{BoxedEventListener, ErrorKind, EventListeners, FnListener};
use std::time::Duration;

/// Identity and observers of a [`RetryEngine`](crate::RetryEngine).
///
/// Policies are passed per call, so one engine serves many operations.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfigBuilder::new().build()
    }
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder {
    name: String,
    event_listeners: EventListeners<RetryEvent>,
}

impl RetryConfigBuilder {
    /// Creates a builder named `"retry"` with no listeners.
    pub fn new() -> Self {
        Self {
            name: "retry".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name for this engine (used in events, logs and metric labels).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a shared listener receiving every event of this engine.
    pub fn listener(mut self, listener: BoxedEventListener<RetryEvent>) -> Self {
        self.event_listeners.add_shared(listener);
        self
    }

    /// Registers a callback before each retry.
    ///
    /// # Callback Signature
    /// `Fn(u32, Duration)` - called with the attempt that just failed and the
    /// delay before the next one.
    ///
    /// # Example
    ///
    /// ```rust
    /// use safeguard_retry::RetryConfig;
    ///
    /// let config = RetryConfig::builder()
    ///     .name("payments")
    ///     .on_retry(|attempt, delay| {
    ///         eprintln!("attempt {attempt} failed, retrying in {delay:?}");
    ///     })
    ///     .build();
    /// assert_eq!(config.name(), "payments");
    /// ```
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback when an operation succeeds, with the number of attempts it took.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when every attempt failed.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Exhausted { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when a failure is not retried because of its kind.
    pub fn on_ignored<F>(mut self, f: F) -> Self
    where
        F: Fn(ErrorKind) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Ignored { kind, .. } = event {
                f(*kind);
            }
        }));
        self
    }

    pub fn build(self) -> RetryConfig {
        RetryConfig {
            name: self.name,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
