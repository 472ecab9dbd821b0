//! Backoff strategies and jitter.
//!
//! Delays are indexed by retry number: retry 1 is the wait after the first
//! failed attempt. Only exponential growth is capped at the configured
//! maximum delay; fixed, linear and Fibonacci delays grow as computed.
//! Jitter is applied last.

use rand::Rng;
use std::time::Duration;

/// Growth pattern of the delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackoffStrategy {
    /// `initial` before every retry.
    Fixed,
    /// `initial * n` before retry `n`.
    Linear,
    /// `min(initial * factor^(n - 1), max_delay)` before retry `n`.
    Exponential,
    /// `initial * fib(n)` before retry `n`, with `fib(1) = fib(2) = 1`.
    Fibonacci,
}

impl BackoffStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackoffStrategy::Fixed => "fixed",
            BackoffStrategy::Linear => "linear",
            BackoffStrategy::Exponential => "exponential",
            BackoffStrategy::Fibonacci => "fibonacci",
        }
    }
}

/// Randomisation applied to a computed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Jitter {
    /// Use the delay as computed.
    None,
    /// Uniform in `[0, d]`.
    Full,
    /// Uniform in `[d / 2, d]`.
    Equal,
}

impl Jitter {
    /// Applies this jitter to `delay` using the given random source.
    pub fn apply<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        let nanos = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        match self {
            Jitter::None => delay,
            Jitter::Full => Duration::from_nanos(rng.random_range(0..=nanos)),
            Jitter::Equal => {
                let half = nanos / 2;
                Duration::from_nanos(rng.random_range(half..=nanos))
            }
        }
    }
}

/// Computes the wait before each retry.
///
/// # Example
///
/// ```
/// use safeguard_retry::{Backoff, BackoffStrategy, Jitter};
/// use std::time::Duration;
///
/// let backoff = Backoff::new(BackoffStrategy::Exponential, Duration::from_millis(100))
///     .max_delay(Duration::from_millis(450))
///     .jitter(Jitter::None);
///
/// let delays: Vec<_> = (1..=5).map(|n| backoff.delay_for(n)).collect();
/// assert_eq!(delays, [100, 200, 400, 450, 450].map(Duration::from_millis));
///
/// let fibonacci = Backoff::new(BackoffStrategy::Fibonacci, Duration::from_millis(100))
///     .max_delay(Duration::from_millis(450));
/// assert_eq!(fibonacci.delay_for(6), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    pub(crate) strategy: BackoffStrategy,
    pub(crate) initial_delay: Duration,
    pub(crate) backoff_factor: f64,
    pub(crate) max_delay: Duration,
    pub(crate) jitter: Jitter,
}

impl Backoff {
    /// Creates a backoff with a factor of 2, a 30 second exponential cap and
    /// no jitter.
    pub fn new(strategy: BackoffStrategy, initial_delay: Duration) -> Self {
        Self {
            strategy,
            initial_delay,
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: Jitter::None,
        }
    }

    /// Sets the growth factor used by [`BackoffStrategy::Exponential`].
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Sets the upper bound on exponential delays.
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn strategy(&self) -> BackoffStrategy {
        self.strategy
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn max(&self) -> Duration {
        self.max_delay
    }

    pub fn jitter_mode(&self) -> Jitter {
        self.jitter
    }

    /// Delay before retry `retry` (1-based) without jitter, capped at the maximum.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let n = retry.max(1);
        match self.strategy {
            BackoffStrategy::Fixed => self.initial_delay,
            BackoffStrategy::Linear => self.initial_delay.saturating_mul(n),
            BackoffStrategy::Exponential => {
                let nanos = self.initial_delay.as_nanos() as f64
                    * self.backoff_factor.powi(i32::try_from(n - 1).unwrap_or(i32::MAX));
                if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
                    return self.max_delay;
                }
                Duration::from_nanos(nanos.round() as u64)
            }
            BackoffStrategy::Fibonacci => {
                let multiplier = u32::try_from(fibonacci(n)).unwrap_or(u32::MAX);
                self.initial_delay.saturating_mul(multiplier)
            }
        }
    }

    /// Delay before retry `retry` (1-based) with jitter applied.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if self.jitter == Jitter::None || base.is_zero() {
            return base;
        }
        self.jitter.apply(base, &mut rand::rng())
    }
}

/// The `n`th Fibonacci number with `fib(1) = fib(2) = 1`, saturating at `u64::MAX`.
pub fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        if a == u64::MAX {
            break;
        }
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    a
}
