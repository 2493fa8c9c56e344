// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ingest and expiry counters.

use super::store::BatchOutcome;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters shared by the ingest and expiry loops.
#[derive(Debug)]
pub struct TopologyStats {
    /// Datagrams received from the socket.
    pub datagrams_received: AtomicU64,

    /// Datagrams discarded by the decoder.
    pub datagrams_rejected: AtomicU64,

    /// Edges seen for the first time.
    pub edges_inserted: AtomicU64,

    /// Edges replaced by a newer observation.
    pub edges_refreshed: AtomicU64,

    /// Observations discarded as equal-or-older.
    pub edges_stale: AtomicU64,

    /// Socket receive failures.
    pub receive_errors: AtomicU64,

    /// Expiry sweeps performed.
    pub sweeps: AtomicU64,

    /// Edges removed by expiry.
    pub edges_expired: AtomicU64,

    /// Creation time.
    pub created: Instant,
}

impl Default for TopologyStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TopologyStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self {
            datagrams_received: AtomicU64::new(0),
            datagrams_rejected: AtomicU64::new(0),
            edges_inserted: AtomicU64::new(0),
            edges_refreshed: AtomicU64::new(0),
            edges_stale: AtomicU64::new(0),
            receive_errors: AtomicU64::new(0),
            sweeps: AtomicU64::new(0),
            edges_expired: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    pub(crate) fn record_datagram(&self) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.datagrams_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self, outcome: &BatchOutcome) {
        self.edges_inserted
            .fetch_add(outcome.inserted as u64, Ordering::Relaxed);
        self.edges_refreshed
            .fetch_add(outcome.refreshed as u64, Ordering::Relaxed);
        self.edges_stale
            .fetch_add(outcome.stale as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_receive_error(&self) {
        self.receive_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sweep(&self, removed: usize) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.edges_expired
            .fetch_add(removed as u64, Ordering::Relaxed);
    }

    /// Get snapshot of current counters.
    pub fn snapshot(&self) -> TopologyStatsSnapshot {
        TopologyStatsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            datagrams_rejected: self.datagrams_rejected.load(Ordering::Relaxed),
            edges_inserted: self.edges_inserted.load(Ordering::Relaxed),
            edges_refreshed: self.edges_refreshed.load(Ordering::Relaxed),
            edges_stale: self.edges_stale.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            edges_expired: self.edges_expired.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

/// Point-in-time copy of [`TopologyStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyStatsSnapshot {
    pub datagrams_received: u64,
    pub datagrams_rejected: u64,
    pub edges_inserted: u64,
    pub edges_refreshed: u64,
    pub edges_stale: u64,
    pub receive_errors: u64,
    pub sweeps: u64,
    pub edges_expired: u64,
    pub uptime_secs: u64,
}

impl TopologyStatsSnapshot {
    /// Datagrams accepted by the decoder.
    pub fn datagrams_accepted(&self) -> u64 {
        self.datagrams_received
            .saturating_sub(self.datagrams_rejected)
    }

    /// Received datagrams per second of uptime.
    pub fn datagrams_per_second(&self) -> f64 {
        if self.uptime_secs > 0 {
            self.datagrams_received as f64 / self.uptime_secs as f64
        } else {
            0.0
        }
    }
}
