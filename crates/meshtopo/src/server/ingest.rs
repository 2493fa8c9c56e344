// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram ingest loop.
//!
//! Receives one report per datagram and merges its edges into the store.
//! A report that fails to decode is dropped whole; nothing from it reaches the
//! store. Socket errors are logged and the loop keeps going until too many
//! arrive back to back, which is treated as a dead socket.

use super::protocol::{DecodeError, LinkReport};
use super::stats::TopologyStats;
use super::store::{BatchOutcome, EdgeStore};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, trace, warn};

/// Fatal ingest failures.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("socket failed {count} times in a row, last error: {last}")]
    Transport { count: u32, last: std::io::Error },
}

/// Receives node reports and applies them to the store.
pub struct Ingestor {
    socket: Arc<UdpSocket>,
    store: Arc<EdgeStore>,
    stats: Arc<TopologyStats>,
    max_datagram_size: usize,
    max_consecutive_errors: u32,
}

impl Ingestor {
    /// Create an ingestor over an already-bound socket.
    pub fn new(
        socket: Arc<UdpSocket>,
        store: Arc<EdgeStore>,
        stats: Arc<TopologyStats>,
        max_datagram_size: usize,
        max_consecutive_errors: u32,
    ) -> Self {
        Self {
            socket,
            store,
            stats,
            max_datagram_size,
            max_consecutive_errors,
        }
    }

    /// Run until shutdown is signalled or the socket keeps failing.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), IngestError> {
        let mut buf = vec![0u8; self.max_datagram_size];
        let mut failures = ReceiveFailures::new(self.max_consecutive_errors);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, peer)) => {
                            failures.reset();
                            self.handle_datagram(&buf[..len], peer);
                        }
                        Err(e) => {
                            self.stats.record_receive_error();
                            failures.record(e)?;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    debug!("Ingest loop shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    fn handle_datagram(&self, payload: &[u8], peer: SocketAddr) {
        // Rejected datagrams are logged and counted by `apply_datagram`.
        if let Ok(outcome) = apply_datagram(&self.store, &self.stats, payload, peer) {
            if outcome.applied() == 0 {
                trace!("Report from {} carried no newer observations", peer);
            }
        }
    }
}

/// Consecutive receive error tracking.
///
/// Any successful receive clears the streak; reaching the limit turns the
/// last error into a fatal [`IngestError::Transport`].
#[derive(Debug)]
pub struct ReceiveFailures {
    limit: u32,
    consecutive: u32,
}

impl ReceiveFailures {
    /// Track errors against `limit` (at least 1).
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            consecutive: 0,
        }
    }

    /// Clear the streak after a successful receive.
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Current streak length.
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Count one receive error; fails once the streak reaches the limit.
    pub fn record(&mut self, err: std::io::Error) -> Result<(), IngestError> {
        self.consecutive += 1;
        if self.consecutive >= self.limit {
            error!(
                "Ingest stopping after {} receive errors: {}",
                self.consecutive, err
            );
            return Err(IngestError::Transport {
                count: self.consecutive,
                last: err,
            });
        }
        warn!("Receive error ({} in a row): {}", self.consecutive, err);
        Ok(())
    }
}

/// Decode one datagram and merge it into `store`.
///
/// Returns the merge tally, or the reason the datagram was dropped.
pub fn apply_datagram(
    store: &EdgeStore,
    stats: &TopologyStats,
    payload: &[u8],
    peer: SocketAddr,
) -> Result<BatchOutcome, DecodeError> {
    stats.record_datagram();

    let report = match LinkReport::decode(payload) {
        Ok(report) => report,
        Err(e) => {
            stats.record_rejected();
            debug!("Dropped datagram from {}: {}", peer, e);
            return Err(e);
        }
    };

    let sender = report.sender;
    let outcome = store.upsert_batch(report.edges);
    stats.record_batch(&outcome);
    trace!(
        "Report from {} ({}): {} new, {} refreshed, {} stale",
        sender,
        peer,
        outcome.inserted,
        outcome.refreshed,
        outcome.stale
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::edge::EdgeKey;
    use std::time::Duration;

    fn peer() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    #[test]
    fn test_apply_datagram_merges_edges() {
        let store = EdgeStore::new();
        let stats = TopologyStats::new();
        let payload = br#"{"sender":"d1","edges":{
            "d1,gs":{"rssi":-40,"timestamp":100},
            "d2,d1":{"rssi":-60,"timestamp":100}
        }}"#;

        let outcome = apply_datagram(&store, &stats, payload, peer()).unwrap();
        assert_eq!(outcome.inserted, 2);
        assert_eq!(store.len(), 2);
        assert!(store.get(&EdgeKey::new("d1", "d2").unwrap()).is_some());

        let snap = stats.snapshot();
        assert_eq!(snap.datagrams_received, 1);
        assert_eq!(snap.edges_inserted, 2);
    }

    #[test]
    fn test_corrupt_datagram_is_not_partially_applied() {
        let store = EdgeStore::new();
        let stats = TopologyStats::new();
        let payload = br#"{"sender":"d1","edges":{
            "d1,gs":{"rssi":-40,"timestamp":100},
            "d1-d2":{"rssi":-60,"timestamp":100}
        }}"#;

        assert!(apply_datagram(&store, &stats, payload, peer()).is_err());
        assert!(store.is_empty());
        assert_eq!(stats.snapshot().datagrams_rejected, 1);

        // Later datagrams are unaffected
        let good = br#"{"sender":"d1","edges":{"d1,gs":{"rssi":-40,"timestamp":100}}}"#;
        assert!(apply_datagram(&store, &stats, good, peer()).is_ok());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_out_of_order_reports() {
        let store = EdgeStore::new();
        let stats = TopologyStats::new();
        let newer = br#"{"sender":"a","edges":{"a,b":{"rssi":-40,"timestamp":100}}}"#;
        let older = br#"{"sender":"b","edges":{"b,a":{"rssi":-90,"timestamp":90}}}"#;

        apply_datagram(&store, &stats, newer, peer()).unwrap();
        let outcome = apply_datagram(&store, &stats, older, peer()).unwrap();

        assert_eq!(outcome.stale, 1);
        assert_eq!(store.get(&EdgeKey::new("a", "b").unwrap()).unwrap().metric, -40);
        assert_eq!(stats.snapshot().edges_stale, 1);
    }

    fn refused() -> std::io::Error {
        std::io::Error::from(std::io::ErrorKind::ConnectionRefused)
    }

    #[test]
    fn test_receive_failures_reach_limit() {
        let mut failures = ReceiveFailures::new(3);
        assert!(failures.record(refused()).is_ok());
        assert!(failures.record(refused()).is_ok());

        match failures.record(refused()) {
            Err(IngestError::Transport { count, last }) => {
                assert_eq!(count, 3);
                assert_eq!(last.kind(), std::io::ErrorKind::ConnectionRefused);
            }
            other => panic!("expected transport failure, got {:?}", other),
        }
    }

    #[test]
    fn test_receive_success_resets_streak() {
        let mut failures = ReceiveFailures::new(3);
        failures.record(refused()).unwrap();
        failures.record(refused()).unwrap();
        assert_eq!(failures.consecutive(), 2);

        failures.reset();
        assert_eq!(failures.consecutive(), 0);
        failures.record(refused()).unwrap();
        failures.record(refused()).unwrap();
        assert!(matches!(
            failures.record(refused()),
            Err(IngestError::Transport { count: 3, .. })
        ));
    }

    #[test]
    fn test_zero_limit_fails_on_first_error() {
        let mut failures = ReceiveFailures::new(0);
        assert!(matches!(
            failures.record(refused()),
            Err(IngestError::Transport { count: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_run_receives_and_stops() {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let addr = socket.local_addr().unwrap();
        let store = Arc::new(EdgeStore::new());
        let stats = Arc::new(TopologyStats::new());
        let ingestor = Ingestor::new(socket, store.clone(), stats.clone(), 2048, 4);

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(async move { ingestor.run(rx).await });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"garbage", addr).await.unwrap();
        client
            .send_to(
                br#"{"sender":"n1","edges":{"n1,n2":{"rssi":-52,"timestamp":10}}}"#,
                addr,
            )
            .await
            .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while store.is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.len(), 1);
        assert_eq!(stats.snapshot().datagrams_rejected, 1);

        tx.send_replace(true);
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
