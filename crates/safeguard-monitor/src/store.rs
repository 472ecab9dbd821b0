//! Bounded, sharded event buffer.
//!
//! Appends are spread round-robin over independently locked ring buffers so
//! concurrent writers rarely contend; reads merge the shards back into
//! insertion order.

use crate::event::ErrorEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

type Shard = VecDeque<(u64, ErrorEvent)>;

pub(crate) struct EventStore {
    shards: Box<[Mutex<Shard>]>,
    per_shard: usize,
    sequence: AtomicU64,
}

impl EventStore {
    /// `capacity` is spread evenly, rounding up, over `shards` buffers.
    pub(crate) fn new(capacity: usize, shards: usize) -> Self {
        let shards = shards.max(1);
        let per_shard = capacity.div_ceil(shards).max(1);
        Self {
            shards: (0..shards)
                .map(|_| Mutex::new(VecDeque::with_capacity(per_shard.min(1024))))
                .collect(),
            per_shard,
            sequence: AtomicU64::new(0),
        }
    }

    fn shard(&self, index: usize) -> MutexGuard<'_, Shard> {
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an event, evicting the oldest entry of its shard when full.
    pub(crate) fn push(&self, event: ErrorEvent) {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let index = (seq % self.shards.len() as u64) as usize;
        let mut shard = self.shard(index);
        if shard.len() == self.per_shard {
            shard.pop_front();
        }
        shard.push_back((seq, event));
    }

    /// Up to `limit` events, newest first.
    pub(crate) fn recent(&self, limit: usize) -> Vec<ErrorEvent> {
        let mut merged: Vec<(u64, ErrorEvent)> = Vec::new();
        for index in 0..self.shards.len() {
            let shard = self.shard(index);
            merged.extend(shard.iter().rev().take(limit).cloned());
        }
        merged.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        merged.truncate(limit);
        merged.into_iter().map(|(_, event)| event).collect()
    }

    pub(crate) fn len(&self) -> usize {
        (0..self.shards.len()).map(|i| self.shard(i).len()).sum()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.per_shard * self.shards.len()
    }

    pub(crate) fn clear(&self) {
        for index in 0..self.shards.len() {
            self.shard(index).clear();
        }
    }
}
