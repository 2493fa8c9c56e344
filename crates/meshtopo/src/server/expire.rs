// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Periodic removal of stale edges.
//!
//! With the default sweep period of half the edge timeout, an edge is gone at
//! most 1.5x the timeout after its last report.

use super::edge::unix_now;
use super::stats::TopologyStats;
use super::store::EdgeStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Sweeps the store on a fixed period.
pub struct Expirer {
    store: Arc<EdgeStore>,
    stats: Arc<TopologyStats>,
    edge_timeout: Duration,
    interval: Duration,
}

impl Expirer {
    /// Create an expirer.
    pub fn new(
        store: Arc<EdgeStore>,
        stats: Arc<TopologyStats>,
        edge_timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            stats,
            edge_timeout,
            interval,
        }
    }

    /// Sweep period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sweep as of `now` (seconds since the Unix epoch).
    pub fn sweep_at(&self, now: f64) -> usize {
        let removed = self
            .store
            .sweep_expired(now, self.edge_timeout.as_secs_f64());
        self.stats.record_sweep(removed);
        if removed > 0 {
            info!("Removed {} expired edges", removed);
        }
        removed
    }

    /// Sweep every interval until shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.sweep_at(unix_now());
                }
                _ = shutdown.changed() => {
                    debug!("Expirer shutting down");
                    break;
                }
            }
        }
    }
}
