//! Per-operation sliding windows built from fixed-width time buckets.

use crate::event::Signal;
use safeguard_core::ErrorKind;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// Outcome counts over some span of buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WindowCounts {
    pub successes: u64,
    pub failures: u64,
    pub capacity_rejections: u64,
    pub recovered: u64,
    pub recovery_failures: u64,
    pub by_kind: BTreeMap<ErrorKind, u64>,
}

impl WindowCounts {
    /// Calls that reached the dependency and finished.
    pub fn total(&self) -> u64 {
        self.successes + self.failures
    }

    /// Failures over finished calls; zero when nothing ran.
    pub fn error_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.failures as f64 / total as f64,
        }
    }

    pub fn count_of(&self, kind: ErrorKind) -> u64 {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub(crate) fn merge(&mut self, other: &Bucket) {
        self.successes += other.successes;
        self.failures += other.failures;
        self.capacity_rejections += other.capacity_rejections;
        self.recovered += other.recovered;
        self.recovery_failures += other.recovery_failures;
        for (kind, count) in ErrorKind::ALL.iter().zip(other.by_kind) {
            if count > 0 {
                *self.by_kind.entry(*kind).or_insert(0) += count;
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Bucket {
    index: u64,
    successes: u64,
    failures: u64,
    capacity_rejections: u64,
    recovered: u64,
    recovery_failures: u64,
    by_kind: [u64; ErrorKind::ALL.len()],
}

/// Ring of buckets for one operation, oldest first, bounded by `retention`.
#[derive(Debug)]
pub(crate) struct OperationWindow {
    buckets: VecDeque<Bucket>,
    retention: u64,
}

impl OperationWindow {
    pub(crate) fn new(retention: u64) -> Self {
        Self {
            buckets: VecDeque::new(),
            retention: retention.max(1),
        }
    }

    fn bucket_mut(&mut self, index: u64) -> Option<&mut Bucket> {
        let newest = self.buckets.back().map(|b| b.index);
        match newest {
            Some(newest) if index < newest => {
                // Late event: find its bucket if still retained.
                self.buckets.iter_mut().rev().find(|b| b.index == index)
            }
            Some(newest) if index == newest => self.buckets.back_mut(),
            _ => {
                self.buckets.push_back(Bucket {
                    index,
                    ..Bucket::default()
                });
                self.prune(index);
                self.buckets.back_mut()
            }
        }
    }

    pub(crate) fn record_success(&mut self, index: u64) {
        if let Some(bucket) = self.bucket_mut(index) {
            bucket.successes += 1;
        }
    }

    pub(crate) fn record(&mut self, index: u64, signal: Signal, kind: ErrorKind) {
        let Some(bucket) = self.bucket_mut(index) else {
            return;
        };
        match signal {
            Signal::Failure => {
                bucket.failures += 1;
                bucket.by_kind[kind as usize] += 1;
            }
            Signal::CapacityRejection => bucket.capacity_rejections += 1,
            Signal::Recovered => {
                bucket.successes += 1;
                bucket.recovered += 1;
            }
            Signal::RecoveryFailed => bucket.recovery_failures += 1,
        }
    }

    /// Counts over buckets `[from, to]`, both inclusive.
    pub(crate) fn counts(&self, from: u64, to: u64) -> WindowCounts {
        let mut counts = WindowCounts::default();
        for bucket in self.buckets.iter().filter(|b| b.index >= from && b.index <= to) {
            counts.merge(bucket);
        }
        counts
    }

    /// Drops buckets older than the retention horizon relative to `current`.
    pub(crate) fn prune(&mut self, current: u64) {
        let oldest_kept = current.saturating_sub(self.retention - 1);
        while self.buckets.front().is_some_and(|b| b.index < oldest_kept) {
            self.buckets.pop_front();
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
