use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use safeguard_core::ErrorKind;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CircuitState {
    /// The circuit is closed and calls are allowed.
    Closed = 0,
    /// The circuit is open and calls are rejected.
    Open = 1,
    /// The circuit is half-open and a limited number of probes are allowed.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Stable snake_case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a breaker's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitMetrics {
    /// Current state.
    pub state: CircuitState,
    /// Counted failures inside the failure window since the last success.
    pub failure_count: usize,
    /// Successful calls since creation or the last administrative reset.
    pub success_count: u64,
    /// Counted failures since creation or the last administrative reset.
    pub total_failures: u64,
    /// Calls rejected without invoking the operation.
    pub rejected_count: u64,
    /// Probe successes in a row while half-open.
    pub consecutive_half_open_successes: u32,
    /// Probes currently running.
    pub half_open_in_flight: u32,
    /// When the last counted failure happened.
    pub last_failure_at: Option<Instant>,
    /// Time since the last state transition.
    pub time_since_state_change: Duration,
}

/// Outcome of asking the circuit for admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Admitted { generation: u64, probe: bool },
    Rejected { retry_after: Option<Duration> },
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    // Bumped on every transition; outcomes carrying an older generation are stale.
    generation: u64,
    last_state_change: Instant,
    failures: VecDeque<Instant>,
    last_failure_at: Option<Instant>,
    success_count: u64,
    total_failures: u64,
    rejected_count: u64,
    consecutive_half_open_successes: u32,
    half_open_in_flight: u32,
}

impl Circuit {
    pub(crate) fn new_with_atomic(state_atomic: Arc<AtomicU8>) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            state: CircuitState::Closed,
            state_atomic,
            generation: 0,
            last_state_change: Instant::now(),
            failures: VecDeque::new(),
            last_failure_at: None,
            success_count: 0,
            total_failures: 0,
            rejected_count: 0,
            consecutive_half_open_successes: 0,
            half_open_in_flight: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn new() -> Self {
        Self::new_with_atomic(Arc::new(AtomicU8::new(0)))
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn metrics(&self, config: &CircuitBreakerConfig, now: Instant) -> CircuitMetrics {
        CircuitMetrics {
            state: self.state,
            failure_count: self.failures_in_window(config, now),
            success_count: self.success_count,
            total_failures: self.total_failures,
            rejected_count: self.rejected_count,
            consecutive_half_open_successes: self.consecutive_half_open_successes,
            half_open_in_flight: self.half_open_in_flight,
            last_failure_at: self.last_failure_at,
            time_since_state_change: now.saturating_duration_since(self.last_state_change),
        }
    }

    /// Time left before an open circuit admits a probe. `None` unless open.
    pub fn remaining_open(&self, config: &CircuitBreakerConfig, now: Instant) -> Option<Duration> {
        if self.state != CircuitState::Open {
            return None;
        }
        let since = self.last_failure_at.unwrap_or(self.last_state_change);
        Some(
            config
                .recovery_timeout
                .saturating_sub(now.saturating_duration_since(since)),
        )
    }

    fn failures_in_window(&self, config: &CircuitBreakerConfig, now: Instant) -> usize {
        self.failures
            .iter()
            .filter(|at| now.saturating_duration_since(**at) <= config.failure_window)
            .count()
    }

    fn prune_failures(&mut self, config: &CircuitBreakerConfig, now: Instant) {
        while let Some(at) = self.failures.front() {
            if now.saturating_duration_since(*at) > config.failure_window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn try_acquire(&mut self, config: &CircuitBreakerConfig, now: Instant) -> Admission {
        if self.state == CircuitState::Open {
            match self.remaining_open(config, now) {
                Some(remaining) if remaining.is_zero() => {
                    self.transition_to(CircuitState::HalfOpen, config, now);
                }
                remaining => return self.reject(config, now, remaining),
            }
        }

        let probe = match self.state {
            CircuitState::Closed => false,
            CircuitState::HalfOpen => {
                if self.half_open_in_flight >= config.half_open_trial_limit {
                    return self.reject(config, now, None);
                }
                self.half_open_in_flight += 1;
                true
            }
            CircuitState::Open => return self.reject(config, now, None),
        };

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::CallPermitted {
                source: config.name.clone(),
                timestamp: now,
                state: self.state,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "permitted").increment(1);

        Admission::Admitted {
            generation: self.generation,
            probe,
        }
    }

    fn reject(
        &mut self,
        config: &CircuitBreakerConfig,
        now: Instant,
        retry_after: Option<Duration>,
    ) -> Admission {
        self.rejected_count += 1;
        config
            .event_listeners
            .emit(&CircuitBreakerEvent::CallRejected {
                source: config.name.clone(),
                timestamp: now,
                state: self.state,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "rejected").increment(1);

        Admission::Rejected { retry_after }
    }

    pub fn record_success(&mut self, config: &CircuitBreakerConfig, generation: u64, now: Instant) {
        self.success_count += 1;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                source: config.name.clone(),
                timestamp: now,
                state: self.state,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "success").increment(1);

        if generation != self.generation {
            return;
        }

        match self.state {
            CircuitState::Closed => self.failures.clear(),
            CircuitState::HalfOpen => {
                self.consecutive_half_open_successes += 1;
                if self.consecutive_half_open_successes >= config.half_open_trial_limit {
                    self.transition_to(CircuitState::Closed, config, now);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(
        &mut self,
        config: &CircuitBreakerConfig,
        generation: u64,
        kind: ErrorKind,
        now: Instant,
    ) {
        if !config.classifier.is_failure(kind) {
            config
                .event_listeners
                .emit(&CircuitBreakerEvent::FailureIgnored {
                    source: config.name.clone(),
                    timestamp: now,
                    kind,
                });
            return;
        }

        self.total_failures += 1;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                source: config.name.clone(),
                timestamp: now,
                state: self.state,
                kind,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "failure").increment(1);

        if generation != self.generation {
            return;
        }

        match self.state {
            CircuitState::Closed => {
                self.last_failure_at = Some(now);
                self.prune_failures(config, now);
                self.failures.push_back(now);
                if self.failures.len() >= config.failure_threshold as usize {
                    self.transition_to(CircuitState::Open, config, now);
                }
            }
            CircuitState::HalfOpen => {
                self.last_failure_at = Some(now);
                self.transition_to(CircuitState::Open, config, now);
            }
            CircuitState::Open => {}
        }
    }

    /// Frees a probe slot taken by a permit of `generation`.
    pub fn release_probe(&mut self, generation: u64) {
        if generation == self.generation && self.state == CircuitState::HalfOpen {
            self.half_open_in_flight = self.half_open_in_flight.saturating_sub(1);
        }
    }

    pub fn force_open(&mut self, config: &CircuitBreakerConfig, now: Instant) {
        self.last_failure_at = Some(now);
        self.transition_to(CircuitState::Open, config, now);
    }

    pub fn force_closed(&mut self, config: &CircuitBreakerConfig, now: Instant) {
        self.transition_to(CircuitState::Closed, config, now);
    }

    /// Closes the circuit and zeroes every counter.
    pub fn reset(&mut self, config: &CircuitBreakerConfig, now: Instant) {
        self.transition_to(CircuitState::Closed, config, now);
        self.generation += 1;
        self.failures.clear();
        self.last_failure_at = None;
        self.success_count = 0;
        self.total_failures = 0;
        self.rejected_count = 0;
    }

    fn transition_to(&mut self, state: CircuitState, config: &CircuitBreakerConfig, now: Instant) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                source: config.name.clone(),
                timestamp: now,
                from_state,
                to_state: state,
            });

        #[cfg(feature = "tracing")]
        match state {
            CircuitState::Open => {
                tracing::warn!(breaker = %config.name, from = %from_state, to = %state, "circuit state transition")
            }
            _ => {
                tracing::info!(breaker = %config.name, from = %from_state, to = %state, "circuit state transition")
            }
        }

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone())
                .set(state as u8 as f64);
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.generation += 1;
        self.last_state_change = now;
        self.consecutive_half_open_successes = 0;
        self.half_open_in_flight = 0;
        if state == CircuitState::Closed {
            self.failures.clear();
        }
    }
}
