//! Retry policies: how many attempts, how long to wait, and which failures
//! are worth another try.

use crate::backoff::{Backoff, BackoffStrategy, Jitter};
use safeguard_core::{ConfigError, ErrorKind};
use std::collections::BTreeSet;
use std::time::Duration;

/// Decides whether and when a failed attempt is retried.
///
/// Kinds that are the caller's fault (validation, permission, not found)
/// and capacity rejections are never retried, whatever the configured sets
/// say. Otherwise an explicit non-retryable entry wins over a retryable one.
///
/// # Example
///
/// ```
/// use safeguard_core::ErrorKind;
/// use safeguard_retry::{BackoffStrategy, Jitter, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::builder()
///     .max_attempts(3)
///     .strategy(BackoffStrategy::Exponential)
///     .initial_delay(Duration::from_secs(1))
///     .jitter(Jitter::None)
///     .build()
///     .unwrap();
///
/// assert!(policy.should_retry(ErrorKind::ServiceUnavailable));
/// assert!(!policy.should_retry(ErrorKind::ValidationFailure));
/// assert_eq!(policy.delay_for(2), Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) backoff: Backoff,
    pub(crate) retryable_kinds: BTreeSet<ErrorKind>,
    pub(crate) non_retryable_kinds: BTreeSet<ErrorKind>,
    pub(crate) retry_all: bool,
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Retries every kind except the ones that must never be retried.
    pub fn retry_all_except_non_retryable(max_attempts: u32) -> Result<Self, ConfigError> {
        RetryPolicyBuilder::new()
            .max_attempts(max_attempts)
            .retry_all_except_non_retryable()
            .build()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn retryable_kinds(&self) -> &BTreeSet<ErrorKind> {
        &self.retryable_kinds
    }

    pub fn non_retryable_kinds(&self) -> &BTreeSet<ErrorKind> {
        &self.non_retryable_kinds
    }

    pub fn retries_all(&self) -> bool {
        self.retry_all
    }

    /// Whether a failure of this kind may be retried.
    pub fn should_retry(&self, kind: ErrorKind) -> bool {
        if kind.is_never_retried() || self.non_retryable_kinds.contains(&kind) {
            return false;
        }
        self.retry_all || self.retryable_kinds.contains(&kind)
    }

    /// Delay before retry `retry` (1-based), jitter included.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff.delay_for(retry)
    }
}

impl Default for RetryPolicy {
    /// Three attempts, exponential backoff from 100ms capped at 30s, full jitter.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::new(BackoffStrategy::Exponential, Duration::from_millis(100))
                .jitter(Jitter::Full),
            retryable_kinds: default_retryable(),
            non_retryable_kinds: default_non_retryable(),
            retry_all: false,
        }
    }
}

fn default_retryable() -> BTreeSet<ErrorKind> {
    ErrorKind::ALL
        .iter()
        .copied()
        .filter(ErrorKind::is_retryable)
        .collect()
}

fn default_non_retryable() -> BTreeSet<ErrorKind> {
    ErrorKind::ALL
        .iter()
        .copied()
        .filter(ErrorKind::is_never_retried)
        .collect()
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
        }
    }

    /// Total attempts including the first one. `1` disables retrying.
    ///
    /// Default: 3
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts;
        self
    }

    /// Default: [`BackoffStrategy::Exponential`]
    pub fn strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.policy.backoff.strategy = strategy;
        self
    }

    /// Default: 100ms
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.backoff.initial_delay = delay;
        self
    }

    /// Growth factor for exponential backoff, at least 1.
    ///
    /// Default: 2.0
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.policy.backoff.backoff_factor = factor;
        self
    }

    /// Cap on exponential delays. Other strategies ignore it.
    ///
    /// Default: 30s
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.backoff.max_delay = delay;
        self
    }

    /// Default: [`Jitter::Full`]
    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.policy.backoff.jitter = jitter;
        self
    }

    /// Replaces the backoff wholesale.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.policy.backoff = backoff;
        self
    }

    /// Replaces the set of retryable kinds.
    pub fn retryable_kinds(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.policy.retryable_kinds = kinds.into_iter().collect();
        self
    }

    /// Adds one retryable kind.
    pub fn retry_on(mut self, kind: ErrorKind) -> Self {
        self.policy.retryable_kinds.insert(kind);
        self
    }

    /// Replaces the set of non-retryable kinds.
    ///
    /// Caller faults and capacity rejections stay non-retryable regardless.
    pub fn non_retryable_kinds(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.policy.non_retryable_kinds = kinds.into_iter().collect();
        self
    }

    /// Adds one non-retryable kind.
    pub fn never_retry(mut self, kind: ErrorKind) -> Self {
        self.policy.non_retryable_kinds.insert(kind);
        self
    }

    /// Retries every kind not explicitly marked non-retryable.
    pub fn retry_all_except_non_retryable(mut self) -> Self {
        self.policy.retry_all = true;
        self
    }

    pub fn build(self) -> Result<RetryPolicy, ConfigError> {
        let policy = self.policy;
        if policy.max_attempts == 0 {
            return Err(ConfigError::Zero {
                field: "max_attempts",
            });
        }
        let factor = policy.backoff.backoff_factor;
        if !factor.is_finite() || factor < 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "backoff_factor",
                range: "[1.0, inf)",
                value: factor.to_string(),
            });
        }
        if policy.backoff.strategy == BackoffStrategy::Exponential
            && policy.backoff.max_delay < policy.backoff.initial_delay
        {
            return Err(ConfigError::Inconsistent(format!(
                "max_delay {:?} is shorter than initial_delay {:?}",
                policy.backoff.max_delay, policy.backoff.initial_delay
            )));
        }
        Ok(policy)
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
