//! Circuit breakers for named dependencies.
//!
//! A circuit breaker stops calling a dependency that keeps failing and
//! periodically checks whether it has recovered.
//!
//! ## States
//! - **Closed**: normal operation, calls pass through and failures are counted
//! - **Open**: calls are rejected immediately, the dependency is never touched
//! - **Half-Open**: after the recovery timeout, a bounded number of probes test
//!   the dependency; one failure reopens, enough successes close
//!
//! Only failures the [`FailureClassifier`](classifier::FailureClassifier)
//! counts move the breaker. By default those are the kinds for which
//! [`ErrorKind::trips_circuit`] holds, so a caller's validation error never
//! isolates a healthy database.
//!
//! ## Usage
//!
//! ```rust
//! use safeguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
//! use safeguard_core::ErrorKind;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig::builder()
//!         .name("db")
//!         .failure_threshold(5)
//!         .recovery_timeout(Duration::from_secs(60))
//!         .build()
//!         .unwrap(),
//! );
//!
//! let result = breaker
//!     .call(|| async { Ok::<_, ErrorKind>("row") })
//!     .await;
//! assert!(result.is_ok());
//! assert_eq!(breaker.state_sync(), CircuitState::Closed);
//! # }
//! ```
//!
//! ## Permits
//!
//! [`CircuitBreaker::try_acquire`] admits one logical call and returns a
//! [`CallPermit`]. Every attempt made under the permit records its outcome,
//! so a retry loop running inside one admission still feeds each failure to
//! the breaker and can stop as soon as the circuit opens.
//!
//! ## Feature Flags
//! - `metrics`: enables metrics collection using the `metrics` crate
//! - `tracing`: enables logging using the `tracing` crate

use crate::circuit::{Admission, Circuit};
#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge};
use safeguard_core::{Classify, ErrorKind};
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

pub use circuit::{CircuitMetrics, CircuitState};
pub use classifier::{DefaultClassifier, FailureClassifier, FnClassifier};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::{CircuitBreakerError, CircuitOpen};
pub use events::CircuitBreakerEvent;
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};

mod circuit;
pub mod classifier;
mod config;
mod error;
mod events;
mod layer;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// A named circuit breaker.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct CircuitBreaker {
    circuit: Arc<Mutex<Circuit>>,
    state_atomic: Arc<AtomicU8>,
    config: Arc<CircuitBreakerConfig>,
}

impl CircuitBreaker {
    /// Creates a closed breaker from a configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "circuitbreaker_calls_total",
                    "Total number of calls through the circuit breaker, by outcome"
                );
                describe_counter!(
                    "circuitbreaker_transitions_total",
                    "Total number of circuit breaker state transitions"
                );
                describe_gauge!(
                    "circuitbreaker_state",
                    "Current state of the circuit breaker (0 closed, 1 open, 2 half-open)"
                );
            });
        }

        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            circuit: Arc::new(Mutex::new(Circuit::new_with_atomic(Arc::clone(
                &state_atomic,
            )))),
            state_atomic,
            config: Arc::new(config),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Asks for admission of one logical call.
    ///
    /// An open circuit whose recovery timeout has elapsed moves to half-open
    /// here and the caller becomes a probe, if a probe slot is free.
    pub fn try_acquire(&self) -> Result<CallPermit, CircuitOpen> {
        let admission = self.lock().try_acquire(&self.config, Instant::now());

        match admission {
            Admission::Admitted { generation, probe } => {
                #[cfg(feature = "tracing")]
                tracing::trace!(breaker = %self.config.name, probe, "circuit breaker permitted call");

                Ok(CallPermit {
                    breaker: self.clone(),
                    generation,
                    probe,
                })
            }
            Admission::Rejected { retry_after } => {
                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %self.config.name, ?retry_after, "circuit breaker rejected call");

                Err(CircuitOpen {
                    name: self.config.name.clone(),
                    retry_after,
                })
            }
        }
    }

    /// Runs `operation` if the circuit admits it and records the outcome.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let permit = self.try_acquire()?;
        let result = operation().await;
        permit.record(&result);
        result.map_err(CircuitBreakerError::Inner)
    }

    /// Returns the current state.
    pub fn state(&self) -> CircuitState {
        self.lock().state()
    }

    /// Returns the current state without taking the lock.
    ///
    /// May lag a concurrent transition by a moment; fine for health reporting.
    pub fn state_sync(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    /// Returns whether the circuit is currently open.
    pub fn is_open(&self) -> bool {
        self.state_sync() == CircuitState::Open
    }

    /// Returns a snapshot of the counters.
    pub fn metrics(&self) -> CircuitMetrics {
        self.lock().metrics(&self.config, Instant::now())
    }

    /// Time left before an open circuit admits a probe; `None` unless open.
    pub fn remaining_open(&self) -> Option<Duration> {
        self.lock().remaining_open(&self.config, Instant::now())
    }

    /// Forces the circuit open. It probes again after the recovery timeout.
    pub fn force_open(&self) {
        self.lock().force_open(&self.config, Instant::now());
    }

    /// Forces the circuit closed, discarding counted failures.
    pub fn force_closed(&self) {
        self.lock().force_closed(&self.config, Instant::now());
    }

    /// Closes the circuit and zeroes every counter.
    pub fn reset(&self) {
        self.lock().reset(&self.config, Instant::now());
    }

    /// Returns a tower layer that routes calls through this breaker.
    pub fn layer(&self) -> CircuitBreakerLayer {
        CircuitBreakerLayer::new(self.clone())
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.config.name)
            .field("state", &self.state_sync())
            .finish()
    }
}

/// Admission of one logical call.
///
/// Record each attempt's outcome through the permit. Dropping the permit
/// frees its half-open probe slot.
#[must_use = "an unused permit admits nothing and records nothing"]
pub struct CallPermit {
    breaker: CircuitBreaker,
    generation: u64,
    probe: bool,
}

impl CallPermit {
    /// Records a successful attempt.
    pub fn record_success(&self) {
        self.breaker
            .lock()
            .record_success(&self.breaker.config, self.generation, Instant::now());
    }

    /// Records a failed attempt of the given kind.
    ///
    /// Kinds the breaker's classifier ignores leave its state untouched.
    pub fn record_failure(&self, kind: ErrorKind) {
        self.breaker.lock().record_failure(
            &self.breaker.config,
            self.generation,
            kind,
            Instant::now(),
        );
    }

    /// Records the outcome of an attempt.
    pub fn record<T, E: Classify>(&self, result: &Result<T, E>) {
        match result {
            Ok(_) => self.record_success(),
            Err(e) => self.record_failure(e.kind()),
        }
    }

    /// Whether this permit was admitted as a half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// Whether the circuit opened after this permit was issued.
    ///
    /// Further attempts under this permit should be abandoned.
    pub fn circuit_opened(&self) -> bool {
        self.breaker.is_open()
    }

    /// The breaker that issued this permit.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if self.probe {
            self.breaker.lock().release_probe(self.generation);
        }
    }
}

impl std::fmt::Debug for CallPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallPermit")
            .field("breaker", &self.breaker.config.name)
            .field("probe", &self.probe)
            .finish()
    }
}
