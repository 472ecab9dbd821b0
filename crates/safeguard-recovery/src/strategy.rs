//! Recovery strategies.
//!
//! A strategy runs before every recovery attempt and decides whether the
//! attempt goes ahead. It may wait, call out to restart something, or give
//! up.

use futures::future::BoxFuture;
use futures::FutureExt;
use safeguard_circuitbreaker::CircuitBreaker;
use safeguard_core::ErrorContext;
use safeguard_retry::{Backoff, BackoffStrategy};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Decision of a strategy before one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preparation {
    /// Run the attempt.
    Proceed,
    /// Stop recovering. The reason is logged and reported.
    Abandon(String),
}

/// A named way of getting a failed operation back on its feet.
pub trait RecoveryStrategy: Send + Sync {
    /// Stable label used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Runs before recovery attempt `attempt`, counted from 1.
    fn prepare<'a>(&'a self, attempt: u32, context: &'a ErrorContext)
        -> BoxFuture<'a, Preparation>;
}

/// Type alias for shared strategies.
pub type SharedRecoveryStrategy = Arc<dyn RecoveryStrategy>;

/// Retries straight away.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateRetry;

impl RecoveryStrategy for ImmediateRetry {
    fn name(&self) -> &'static str {
        "immediate_retry"
    }

    fn prepare<'a>(&'a self, _attempt: u32, _context: &'a ErrorContext) -> BoxFuture<'a, Preparation> {
        futures::future::ready(Preparation::Proceed).boxed()
    }
}

/// Sleeps a backoff delay before every attempt, including the first.
#[derive(Debug, Clone)]
pub struct ExponentialBackoffRecovery {
    backoff: Backoff,
}

impl ExponentialBackoffRecovery {
    pub fn new(backoff: Backoff) -> Self {
        Self { backoff }
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }
}

impl Default for ExponentialBackoffRecovery {
    /// 100ms doubling up to 10s, no jitter.
    fn default() -> Self {
        Self::new(
            Backoff::new(BackoffStrategy::Exponential, Duration::from_millis(100))
                .max_delay(Duration::from_secs(10)),
        )
    }
}

impl RecoveryStrategy for ExponentialBackoffRecovery {
    fn name(&self) -> &'static str {
        "exponential_backoff"
    }

    fn prepare<'a>(&'a self, attempt: u32, _context: &'a ErrorContext) -> BoxFuture<'a, Preparation> {
        let delay = self.backoff.delay_for(attempt);
        async move {
            tokio::time::sleep(delay).await;
            Preparation::Proceed
        }
        .boxed()
    }
}

/// Waits out an open circuit before attempting.
///
/// If the breaker will stay open longer than `max_wait`, recovery is
/// abandoned instead of queueing behind it.
#[derive(Debug, Clone)]
pub struct CircuitBreakerAware {
    breaker: CircuitBreaker,
    max_wait: Duration,
}

impl CircuitBreakerAware {
    pub fn new(breaker: CircuitBreaker, max_wait: Duration) -> Self {
        Self { breaker, max_wait }
    }
}

impl RecoveryStrategy for CircuitBreakerAware {
    fn name(&self) -> &'static str {
        "circuit_breaker_aware"
    }

    fn prepare<'a>(&'a self, _attempt: u32, _context: &'a ErrorContext) -> BoxFuture<'a, Preparation> {
        async move {
            match self.breaker.remaining_open() {
                Some(remaining) if remaining > self.max_wait => Preparation::Abandon(format!(
                    "circuit {} stays open for another {remaining:?}",
                    self.breaker.name()
                )),
                Some(remaining) => {
                    tokio::time::sleep(remaining).await;
                    Preparation::Proceed
                }
                None => Preparation::Proceed,
            }
        }
        .boxed()
    }
}

type RestartHook = Arc<dyn Fn(ErrorContext) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Calls an external restart hook before every attempt, then lets the
/// restarted dependency settle.
#[derive(Clone)]
pub struct ExternalRestart {
    hook: RestartHook,
    settle: Duration,
}

impl ExternalRestart {
    pub fn new<F, Fut>(hook: F) -> Self
    where
        F: Fn(ErrorContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        Self {
            hook: Arc::new(move |ctx| hook(ctx).boxed()),
            settle: Duration::ZERO,
        }
    }

    /// Pause between a successful restart and the attempt.
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

impl std::fmt::Debug for ExternalRestart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalRestart")
            .field("settle", &self.settle)
            .finish()
    }
}

impl RecoveryStrategy for ExternalRestart {
    fn name(&self) -> &'static str {
        "external_restart"
    }

    fn prepare<'a>(&'a self, attempt: u32, context: &'a ErrorContext) -> BoxFuture<'a, Preparation> {
        async move {
            match (self.hook)(context.clone()).await {
                Ok(()) => {
                    tracing::info!(operation = context.operation(), attempt, "restart hook succeeded");
                    if !self.settle.is_zero() {
                        tokio::time::sleep(self.settle).await;
                    }
                    Preparation::Proceed
                }
                Err(reason) => Preparation::Abandon(format!("restart failed: {reason}")),
            }
        }
        .boxed()
    }
}

/// Never retries. Recovery goes straight to the degraded path of
/// [`RecoveryManager::recover_or_degrade`](crate::RecoveryManager::recover_or_degrade).
#[derive(Debug, Clone, Copy, Default)]
pub struct GracefulDegradation;

impl RecoveryStrategy for GracefulDegradation {
    fn name(&self) -> &'static str {
        "graceful_degradation"
    }

    fn prepare<'a>(&'a self, _attempt: u32, _context: &'a ErrorContext) -> BoxFuture<'a, Preparation> {
        futures::future::ready(Preparation::Abandon("degrading by policy".into())).boxed()
    }
}
