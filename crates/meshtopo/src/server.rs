// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topology server core.
//!
//! Owns the shared [`EdgeStore`] and drives the two background loops that
//! mutate it: the datagram [`Ingestor`] and the [`Expirer`]. Queries go
//! through [`TopologyQuery`], which only ever reads snapshots.

use crate::config::ServerConfig;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, info};

pub mod edge;
pub mod expire;
pub mod ingest;
pub mod protocol;
pub mod query;
pub mod stats;
pub mod store;

pub use edge::{link_quality, unix_now, EdgeKey, EdgeKeyError, EdgeRecord, NodeId};
pub use expire::Expirer;
pub use ingest::{apply_datagram, IngestError, Ingestor, ReceiveFailures};
pub use protocol::{DecodeError, LinkReport};
pub use query::{build_adjacency, Adjacency, ShortestPath, TopologyQuery};
pub use stats::{TopologyStats, TopologyStatsSnapshot};
pub use store::{BatchOutcome, EdgeStore, UpsertOutcome};

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Bind error on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Server already running")]
    AlreadyRunning,

    #[error("Ingest failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Topology server - live link graph fed by node reports.
#[derive(Clone)]
pub struct TopologyServer {
    config: Arc<ServerConfig>,
    socket: Arc<UdpSocket>,
    store: Arc<EdgeStore>,
    stats: Arc<TopologyStats>,
    shutdown: Arc<watch::Sender<bool>>,
    running: Arc<AtomicBool>,
}

impl TopologyServer {
    /// Validate the configuration and bind the report socket.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let addr = config.listen_addr();
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config: Arc::new(config),
            socket: Arc::new(socket),
            store: Arc::new(EdgeStore::new()),
            stats: Arc::new(TopologyStats::new()),
            shutdown: Arc::new(shutdown),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Run the ingest and expiry loops until shutdown or a fatal ingest error.
    pub async fn run(&self) -> Result<(), ServerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyRunning);
        }

        info!("Topology server listening on {}", self.local_addr()?);

        let expirer = Expirer::new(
            self.store.clone(),
            self.stats.clone(),
            self.config.edge_timeout(),
            self.config.sweep_interval(),
        );
        debug!(
            "Sweeping every {:?}, edge timeout {:?}",
            expirer.interval(),
            self.config.edge_timeout()
        );
        let expirer_shutdown = self.shutdown.subscribe();
        let expirer_task = tokio::spawn(async move { expirer.run(expirer_shutdown).await });

        let ingestor = Ingestor::new(
            self.socket.clone(),
            self.store.clone(),
            self.stats.clone(),
            self.config.max_datagram_size,
            self.config.max_consecutive_receive_errors,
        );
        let result = ingestor.run(self.shutdown.subscribe()).await;
        self.running.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => {
                if let Err(e) = expirer_task.await {
                    error!("Expirer task failed: {}", e);
                }
                debug!("Background loops stopped");
                Ok(())
            }
            Err(e) => {
                // The expirer stays up until `shutdown` so the remaining
                // graph still ages out while the owner decides what to do.
                error!("Ingest loop terminated: {}", e);
                Err(e.into())
            }
        }
    }

    /// Signal every loop to stop at its next suspension point.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Address the report socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Shared edge store.
    pub fn store(&self) -> &Arc<EdgeStore> {
        &self.store
    }

    /// Shared counters.
    pub fn stats(&self) -> &Arc<TopologyStats> {
        &self.stats
    }

    /// Query handle over the live store.
    pub fn query(&self) -> TopologyQuery {
        TopologyQuery::new(self.store.clone())
    }

    /// Check if server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
