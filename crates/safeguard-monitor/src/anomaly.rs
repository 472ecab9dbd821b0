//! Anomaly detection over per-window failure counts.
//!
//! A detector compares the failure count of the current detection window
//! against the counts of the windows before it. Three strategies ship:
//!
//! - [`MultiplierDetector`] (default): current is at least `multiplier` times
//!   the baseline mean.
//! - [`ZScoreDetector`]: current is at least `threshold` standard deviations
//!   above the baseline mean.
//! - [`EwmaDetector`]: current is at least `multiplier` times an
//!   exponentially weighted moving average of the baseline.
//!
//! Means and deviations are floored at one failure per window so a silent
//! baseline does not turn the first stray error into an anomaly.

use serde::Serialize;
use std::fmt;

/// Result of a positive detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub detector: &'static str,
    pub current: f64,
    pub baseline: f64,
    /// Detector-specific strength: a ratio or a z-score.
    pub score: f64,
}

/// A swappable anomaly detection strategy.
pub trait AnomalyDetector: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// `baseline` holds prior window counts, oldest first.
    fn detect(&self, current: f64, baseline: &[f64]) -> Option<Anomaly>;
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Flags a window whose count is `multiplier` times the baseline mean.
#[derive(Debug, Clone)]
pub struct MultiplierDetector {
    multiplier: f64,
}

impl MultiplierDetector {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }
}

impl Default for MultiplierDetector {
    fn default() -> Self {
        Self::new(3.0)
    }
}

impl AnomalyDetector for MultiplierDetector {
    fn name(&self) -> &'static str {
        "multiplier"
    }

    fn detect(&self, current: f64, baseline: &[f64]) -> Option<Anomaly> {
        let base = mean(baseline).max(1.0);
        let ratio = current / base;
        (ratio >= self.multiplier).then(|| Anomaly {
            detector: self.name(),
            current,
            baseline: base,
            score: ratio,
        })
    }
}

/// Flags a window `threshold` standard deviations above the baseline mean.
#[derive(Debug, Clone)]
pub struct ZScoreDetector {
    threshold: f64,
}

impl ZScoreDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for ZScoreDetector {
    fn default() -> Self {
        Self::new(3.0)
    }
}

impl AnomalyDetector for ZScoreDetector {
    fn name(&self) -> &'static str {
        "z_score"
    }

    fn detect(&self, current: f64, baseline: &[f64]) -> Option<Anomaly> {
        let mu = mean(baseline);
        let variance = if baseline.is_empty() {
            0.0
        } else {
            baseline.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / baseline.len() as f64
        };
        let sigma = variance.sqrt().max(1.0);
        let z = (current - mu) / sigma;
        (z >= self.threshold).then(|| Anomaly {
            detector: self.name(),
            current,
            baseline: mu,
            score: z,
        })
    }
}

/// Flags a window `multiplier` times the EWMA of the baseline.
#[derive(Debug, Clone)]
pub struct EwmaDetector {
    alpha: f64,
    multiplier: f64,
}

impl EwmaDetector {
    /// `alpha` in `(0, 1]` weights recent windows; larger reacts faster.
    pub fn new(alpha: f64, multiplier: f64) -> Self {
        Self {
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            multiplier,
        }
    }
}

impl Default for EwmaDetector {
    fn default() -> Self {
        Self::new(0.3, 3.0)
    }
}

impl AnomalyDetector for EwmaDetector {
    fn name(&self) -> &'static str {
        "ewma"
    }

    fn detect(&self, current: f64, baseline: &[f64]) -> Option<Anomaly> {
        let mut values = baseline.iter();
        let first = values.next().copied().unwrap_or(0.0);
        let ewma = values.fold(first, |acc, v| self.alpha * v + (1.0 - self.alpha) * acc);
        let base = ewma.max(1.0);
        let ratio = current / base;
        (ratio >= self.multiplier).then(|| Anomaly {
            detector: self.name(),
            current,
            baseline: ewma,
            score: ratio,
        })
    }
}
