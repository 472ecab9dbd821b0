use crate::error::RecoveryError;
use crate::strategy::{
    ExponentialBackoffRecovery, GracefulDegradation, ImmediateRetry, Preparation,
    RecoveryStrategy, SharedRecoveryStrategy,
};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use safeguard_core::{Classify, ErrorContext, ErrorKind};
use safeguard_monitor::{ErrorEvent, ErrorMonitor};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Counts for one strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StrategyStats {
    pub recoveries: u64,
    pub successful: u64,
}

/// Recovery counters since creation or the last [`reset_stats`](RecoveryManager::reset_stats).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecoveryStats {
    pub total_recoveries: u64,
    pub successful_recoveries: u64,
    /// Recoveries that ended on the degraded path.
    pub degraded: u64,
    /// `successful_recoveries / total_recoveries`, zero before the first recovery.
    pub success_rate: f64,
    pub by_strategy: BTreeMap<String, StrategyStats>,
}

/// Result of [`RecoveryManager::recover_or_degrade`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery<T> {
    /// The operation itself succeeded again.
    Recovered(T),
    /// Recovery failed and the degraded producer answered instead.
    Degraded(T),
}

impl<T> Recovery<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Recovery::Degraded(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Recovery::Recovered(value) | Recovery::Degraded(value) => value,
        }
    }
}

#[derive(Default)]
struct Counters {
    total: AtomicU64,
    successful: AtomicU64,
    degraded: AtomicU64,
    by_strategy: Mutex<BTreeMap<String, StrategyStats>>,
}

impl Counters {
    fn record(&self, strategy: &str, success: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful.fetch_add(1, Ordering::Relaxed);
        }
        let mut by_strategy = self.by_strategy.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = by_strategy.entry(strategy.to_string()).or_default();
        entry.recoveries += 1;
        if success {
            entry.successful += 1;
        }
    }
}

/// Registry of named recovery strategies.
///
/// Created with `immediate_retry`, `exponential_backoff` and
/// `graceful_degradation` registered. Strategies that need a collaborator,
/// such as [`CircuitBreakerAware`](crate::CircuitBreakerAware) or
/// [`ExternalRestart`](crate::ExternalRestart), are registered by the
/// application.
///
/// Every call to [`recover`](Self::recover) counts as one recovery. With a
/// monitor attached, each outcome is also recorded there as a recovered or
/// recovery-failed event.
pub struct RecoveryManager {
    strategies: RwLock<HashMap<String, SharedRecoveryStrategy>>,
    counters: Counters,
    monitor: Option<Arc<ErrorMonitor>>,
}

impl RecoveryManager {
    pub fn new() -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "recovery_attempts_total",
                    "Total number of recoveries, by strategy and outcome"
                );
            });
        }

        let mut strategies: HashMap<String, SharedRecoveryStrategy> = HashMap::new();
        strategies.insert("immediate_retry".into(), Arc::new(ImmediateRetry));
        strategies.insert(
            "exponential_backoff".into(),
            Arc::new(ExponentialBackoffRecovery::default()),
        );
        strategies.insert("graceful_degradation".into(), Arc::new(GracefulDegradation));

        Self {
            strategies: RwLock::new(strategies),
            counters: Counters::default(),
            monitor: None,
        }
    }

    /// Reports every recovery outcome to `monitor`.
    pub fn with_monitor(mut self, monitor: Arc<ErrorMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Registers `strategy` under `name`, replacing any previous one.
    pub fn register<S>(&self, name: impl Into<String>, strategy: S)
    where
        S: RecoveryStrategy + 'static,
    {
        self.register_shared(name, Arc::new(strategy));
    }

    pub fn register_shared(&self, name: impl Into<String>, strategy: SharedRecoveryStrategy) {
        self.strategies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), strategy);
    }

    pub fn strategy(&self, name: &str) -> Option<SharedRecoveryStrategy> {
        self.strategies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered names, sorted.
    pub fn strategy_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .strategies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Tries to get past `error` by re-running `recovery_fn` under the named
    /// strategy, at most `max_attempts` times.
    ///
    /// `recovery_fn` receives the attempt number, counted from 1. A
    /// `max_attempts` of zero is treated as one.
    pub async fn recover<O, F, Fut, T, E>(
        &self,
        error: &O,
        context: &ErrorContext,
        strategy: &str,
        mut recovery_fn: F,
        max_attempts: u32,
    ) -> Result<T, RecoveryError<E>>
    where
        O: Classify + fmt::Display + ?Sized,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let kind = error.kind();
        let Some(chosen) = self.strategy(strategy) else {
            tracing::warn!(operation = context.operation(), strategy, "unknown recovery strategy");
            self.finish(strategy, kind, context, Err("unknown strategy"));
            return Err(RecoveryError::UnknownStrategy(strategy.to_string()));
        };

        tracing::info!(
            operation = context.operation(),
            correlation_id = context.correlation_id(),
            strategy,
            kind = kind.as_str(),
            error = %error,
            "starting recovery"
        );

        let max_attempts = max_attempts.max(1);
        let mut last = None;
        let mut attempt = 0;
        while attempt < max_attempts {
            let next = attempt + 1;
            if let Preparation::Abandon(reason) = chosen.prepare(next, context).await {
                tracing::warn!(
                    operation = context.operation(),
                    strategy,
                    attempts = attempt,
                    reason = %reason,
                    "recovery abandoned"
                );
                self.finish(strategy, kind, context, Err(reason.as_str()));
                return Err(RecoveryError::Abandoned {
                    strategy: strategy.to_string(),
                    attempts: attempt,
                    reason,
                    last,
                });
            }

            attempt = next;
            match recovery_fn(attempt).await {
                Ok(value) => {
                    tracing::info!(
                        operation = context.operation(),
                        strategy,
                        attempts = attempt,
                        "recovery succeeded"
                    );
                    self.finish(strategy, kind, context, Ok(()));
                    return Ok(value);
                }
                Err(e) => {
                    tracing::debug!(
                        operation = context.operation(),
                        strategy,
                        attempt,
                        error = %e,
                        "recovery attempt failed"
                    );
                    last = Some(e);
                }
            }
        }

        let reason = format!("{attempt} attempts failed");
        tracing::warn!(operation = context.operation(), strategy, attempts = attempt, "recovery failed");
        self.finish(strategy, kind, context, Err(reason.as_str()));
        match last {
            Some(last) => Err(RecoveryError::Exhausted {
                strategy: strategy.to_string(),
                attempts: attempt,
                last,
            }),
            None => Err(RecoveryError::Abandoned {
                strategy: strategy.to_string(),
                attempts: attempt,
                reason,
                last: None,
            }),
        }
    }

    /// Like [`recover`](Self::recover), but hands off to `degrade` when
    /// recovery fails for any reason, including an unknown strategy.
    pub async fn recover_or_degrade<O, F, Fut, T, E, D, DFut>(
        &self,
        error: &O,
        context: &ErrorContext,
        strategy: &str,
        recovery_fn: F,
        max_attempts: u32,
        degrade: D,
    ) -> Recovery<T>
    where
        O: Classify + fmt::Display + ?Sized,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        D: FnOnce() -> DFut,
        DFut: Future<Output = T>,
    {
        match self
            .recover(error, context, strategy, recovery_fn, max_attempts)
            .await
        {
            Ok(value) => Recovery::Recovered(value),
            Err(e) => {
                tracing::info!(
                    operation = context.operation(),
                    strategy,
                    cause = %e,
                    "serving degraded result"
                );
                self.counters.degraded.fetch_add(1, Ordering::Relaxed);
                Recovery::Degraded(degrade().await)
            }
        }
    }

    fn finish(
        &self,
        strategy: &str,
        kind: ErrorKind,
        context: &ErrorContext,
        outcome: Result<(), &str>,
    ) {
        self.counters.record(strategy, outcome.is_ok());

        #[cfg(feature = "metrics")]
        counter!(
            "recovery_attempts_total",
            "strategy" => strategy.to_string(),
            "outcome" => if outcome.is_ok() { "success" } else { "failure" }
        )
        .increment(1);

        if let Some(monitor) = &self.monitor {
            let event = match outcome {
                Ok(()) => ErrorEvent::recovered(kind, context.clone())
                    .with_message(format!("recovered via {strategy}")),
                Err(reason) => ErrorEvent::recovery_failed(kind, context.clone())
                    .with_message(format!("{strategy}: {reason}")),
            };
            monitor.record(event);
        }
    }

    pub fn stats(&self) -> RecoveryStats {
        let total = self.counters.total.load(Ordering::Relaxed);
        let successful = self.counters.successful.load(Ordering::Relaxed);
        RecoveryStats {
            total_recoveries: total,
            successful_recoveries: successful,
            degraded: self.counters.degraded.load(Ordering::Relaxed),
            success_rate: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64
            },
            by_strategy: self
                .counters
                .by_strategy
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    /// Zeroes every counter. Registered strategies are kept.
    pub fn reset_stats(&self) {
        self.counters.total.store(0, Ordering::Relaxed);
        self.counters.successful.store(0, Ordering::Relaxed);
        self.counters.degraded.store(0, Ordering::Relaxed);
        self.counters
            .by_strategy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::info!("recovery stats reset");
    }
}

impl Default for RecoveryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecoveryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryManager")
            .field("strategies", &self.strategy_names())
            .field("monitor", &self.monitor.is_some())
            .finish()
    }
}
