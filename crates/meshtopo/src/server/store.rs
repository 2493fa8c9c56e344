// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared edge store.
//!
//! The single source of truth for live links. Every operation takes the
//! internal mutex for the duration of one map operation only; callers copy
//! data out and do their graph work after the lock is released.

use super::edge::{EdgeKey, EdgeRecord};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Result of merging one observation into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First observation for this edge.
    Inserted,
    /// Replaced an older observation.
    Refreshed,
    /// Discarded: the stored observation is as new or newer.
    Stale,
}

/// Tally of a batch merge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub refreshed: usize,
    pub stale: usize,
}

impl BatchOutcome {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Refreshed => self.refreshed += 1,
            UpsertOutcome::Stale => self.stale += 1,
        }
    }

    /// Number of edges that changed the store.
    pub fn applied(&self) -> usize {
        self.inserted + self.refreshed
    }
}

/// Lock-protected map of canonical edge to latest record.
#[derive(Debug, Default)]
pub struct EdgeStore {
    edges: Mutex<HashMap<EdgeKey, EdgeRecord>>,
}

impl EdgeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one observation, keeping whichever has the later `observed_at`.
    pub fn upsert(&self, key: EdgeKey, record: EdgeRecord) -> UpsertOutcome {
        let mut edges = self.edges.lock();
        merge(&mut edges, key, record)
    }

    /// Merge all edges of one report under a single lock acquisition.
    pub fn upsert_batch<I>(&self, batch: I) -> BatchOutcome
    where
        I: IntoIterator<Item = (EdgeKey, EdgeRecord)>,
    {
        let mut outcome = BatchOutcome::default();
        let mut edges = self.edges.lock();
        for (key, record) in batch {
            outcome.record(merge(&mut edges, key, record));
        }
        outcome
    }

    /// Remove every edge whose age at `now` exceeds `ttl`.
    pub fn sweep_expired(&self, now: f64, ttl: f64) -> usize {
        let mut edges = self.edges.lock();
        let before = edges.len();
        edges.retain(|_, record| !record.is_expired(now, ttl));
        before - edges.len()
    }

    /// Independent copy of the current contents.
    pub fn snapshot(&self) -> HashMap<EdgeKey, EdgeRecord> {
        self.edges.lock().clone()
    }

    /// Snapshot entries in ascending canonical key order.
    pub fn list_sorted(&self) -> Vec<(EdgeKey, EdgeRecord)> {
        let mut entries: Vec<_> = self.snapshot().into_iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries
    }

    /// Look up the current record for one edge.
    pub fn get(&self, key: &EdgeKey) -> Option<EdgeRecord> {
        self.edges.lock().get(key).copied()
    }

    /// Number of live edges.
    pub fn len(&self) -> usize {
        self.edges.lock().len()
    }

    /// Whether the store holds no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.lock().is_empty()
    }
}

fn merge(
    edges: &mut HashMap<EdgeKey, EdgeRecord>,
    key: EdgeKey,
    record: EdgeRecord,
) -> UpsertOutcome {
    match edges.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(record);
            UpsertOutcome::Inserted
        }
        Entry::Occupied(mut slot) => {
            if record.observed_at > slot.get().observed_at {
                slot.insert(record);
                UpsertOutcome::Refreshed
            } else {
                UpsertOutcome::Stale
            }
        }
    }
}
