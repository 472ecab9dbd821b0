//! Retry engine for classified failures.
//!
//! A [`RetryEngine`] re-invokes an async operation according to a
//! [`RetryPolicy`]: it stops on success, on a failure kind the policy does
//! not retry, or when the attempt budget is spent, and sleeps the policy's
//! backoff between attempts. Every failed attempt is kept in a trail of
//! [`AttemptFailure`](safeguard_core::AttemptFailure) records.
//!
//! # Backoff
//!
//! - **Fixed**: `initial` before every retry
//! - **Linear**: `initial * n`
//! - **Exponential**: `initial * factor^(n - 1)`
//! - **Fibonacci**: `initial * fib(n)`
//!
//! Every strategy is capped at `max_delay`, then [`Jitter`] is applied.
//!
//! # Examples
//!
//! ```
//! use safeguard_core::{ErrorContext, ErrorKind};
//! use safeguard_retry::{BackoffStrategy, Jitter, RetryConfig, RetryEngine, RetryPolicy};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let engine = RetryEngine::new(
//!     RetryConfig::builder()
//!         .name("inventory")
//!         .on_retry(|attempt, delay| println!("attempt {attempt} failed, waiting {delay:?}"))
//!         .build(),
//! );
//! let policy = RetryPolicy::builder()
//!     .max_attempts(5)
//!     .strategy(BackoffStrategy::Exponential)
//!     .initial_delay(Duration::from_millis(100))
//!     .jitter(Jitter::Equal)
//!     .build()
//!     .unwrap();
//!
//! let calls = AtomicU32::new(0);
//! let stock = engine
//!     .execute(&policy, &ErrorContext::new("fetch_stock"), || async {
//!         if calls.fetch_add(1, Ordering::SeqCst) < 2 {
//!             Err(ErrorKind::ServiceUnavailable)
//!         } else {
//!             Ok(42)
//!         }
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(stock, 42);
//! # }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: enables metrics collection using the `metrics` crate
//! - `tracing`: enables logging using the `tracing` crate

mod backoff;
mod config;
mod error;
mod events;
mod layer;
mod policy;

pub use backoff::{fibonacci, Backoff, BackoffStrategy, Jitter};
pub use config::{RetryConfig, RetryConfigBuilder};
pub use error::RetryError;
pub use events::RetryEvent;
pub use layer::{RetryLayer, RetryService};
pub use policy::{RetryPolicy, RetryPolicyBuilder};

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use safeguard_core::{AttemptFailure, Classify, ErrorContext};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use tokio::time::Instant;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Executes operations under a retry policy.
///
/// Cloning is cheap; clones share listeners.
#[derive(Clone, Debug)]
pub struct RetryEngine {
    config: Arc<RetryConfig>,
}

impl RetryEngine {
    pub fn new(config: RetryConfig) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "retry_attempts_total",
                    "Total number of attempts made by retry engines"
                );
                describe_counter!(
                    "retry_calls_total",
                    "Total number of retried operations, by final outcome"
                );
            });
        }

        Self {
            config: Arc::new(config),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable kind,
    /// or `policy.max_attempts()` attempts have been made.
    ///
    /// With `max_attempts == 1` the operation runs once and no backoff is
    /// computed.
    pub async fn execute<F, Fut, T, E>(
        &self,
        policy: &RetryPolicy,
        context: &ErrorContext,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        #[cfg(not(feature = "tracing"))]
        let _ = context;

        let mut trail = Vec::new();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let started = Instant::now();

            #[cfg(feature = "metrics")]
            counter!("retry_attempts_total", "retry" => self.config.name.clone()).increment(1);

            let error = match operation().await {
                Ok(value) => {
                    self.finish("success");
                    self.config.event_listeners.emit(&RetryEvent::Success {
                        source: self.config.name.clone(),
                        timestamp: Instant::now(),
                        attempts: attempt,
                    });
                    return Ok(value);
                }
                Err(error) => error,
            };

            let kind = error.kind();
            trail.push(AttemptFailure {
                attempt,
                kind,
                message: error.to_string(),
                elapsed: started.elapsed(),
            });

            if !policy.should_retry(kind) {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    retry = %self.config.name,
                    operation = context.operation(),
                    correlation_id = context.correlation_id(),
                    attempt,
                    %kind,
                    "failure is not retryable"
                );
                self.finish("not_retryable");
                self.config.event_listeners.emit(&RetryEvent::Ignored {
                    source: self.config.name.clone(),
                    timestamp: Instant::now(),
                    attempt,
                    kind,
                });
                return Err(RetryError::NotRetryable {
                    attempt,
                    trail,
                    error,
                });
            }

            if attempt >= policy.max_attempts() {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    retry = %self.config.name,
                    operation = context.operation(),
                    correlation_id = context.correlation_id(),
                    attempts = attempt,
                    %kind,
                    "retries exhausted"
                );
                self.finish("exhausted");
                self.config.event_listeners.emit(&RetryEvent::Exhausted {
                    source: self.config.name.clone(),
                    timestamp: Instant::now(),
                    attempts: attempt,
                    kind,
                });
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    trail,
                    last: error,
                });
            }

            let delay = policy.delay_for(attempt);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                retry = %self.config.name,
                operation = context.operation(),
                correlation_id = context.correlation_id(),
                attempt,
                %kind,
                ?delay,
                "attempt failed, retrying"
            );

            self.config.event_listeners.emit(&RetryEvent::Retry {
                source: self.config.name.clone(),
                timestamp: Instant::now(),
                attempt,
                kind,
                delay,
            });

            tokio::time::sleep(delay).await;
        }
    }

    /// Returns a layer retrying a wrapped service under `policy`.
    pub fn layer(&self, policy: RetryPolicy) -> RetryLayer {
        RetryLayer::new(self.clone(), policy)
    }

    #[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
    fn finish(&self, outcome: &'static str) {
        #[cfg(feature = "metrics")]
        counter!(
            "retry_calls_total",
            "retry" => self.config.name.clone(),
            "outcome" => outcome
        )
        .increment(1);
    }
}

impl Default for RetryEngine {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
