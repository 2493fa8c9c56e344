// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Node identifiers, canonical edge keys and edge records.

use std::borrow::Borrow;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// RSSI at or below which a link is considered unusable (0% quality).
pub const RSSI_FLOOR_DBM: i64 = -90;

/// RSSI at or above which a link is considered perfect (100% quality).
pub const RSSI_CEILING_DBM: i64 = -50;

/// Opaque identifier of a mesh participant (drone, ground node, station).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node id.
    ///
    /// Returns `None` unless the id is non-empty and printable: whitespace and
    /// control characters are rejected, since ids are typed at the prompt.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if Self::is_valid(&id) {
            Some(Self(id))
        } else {
            None
        }
    }

    /// Check whether `id` is usable as a node id.
    pub fn is_valid(id: &str) -> bool {
        !id.is_empty() && !id.chars().any(|c| c.is_control() || c.is_whitespace())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Reasons an edge key cannot be formed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EdgeKeyError {
    #[error("edge endpoint is empty")]
    EmptyEndpoint,

    #[error("edge endpoint {0:?} contains whitespace or control characters")]
    InvalidEndpoint(String),

    #[error("edge key {0:?} is not of the form A,B")]
    Malformed(String),

    #[error("self-paired edge on node {0}")]
    SelfLoop(String),
}

/// Unordered pair of two distinct nodes.
///
/// The endpoints are sorted at construction so `(A, B)` and `(B, A)` hash,
/// compare and display identically. The derived `Ord` is the canonical
/// display order used by [`EdgeStore::list_sorted`](super::EdgeStore::list_sorted).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    low: NodeId,
    high: NodeId,
}

impl EdgeKey {
    /// Build the canonical key for a pair of endpoints.
    pub fn new(a: &str, b: &str) -> Result<Self, EdgeKeyError> {
        Self::from_nodes(endpoint(a)?, endpoint(b)?)
    }

    /// Build the canonical key from already-validated node ids.
    pub fn from_nodes(a: NodeId, b: NodeId) -> Result<Self, EdgeKeyError> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Ok(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Ok(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => Err(EdgeKeyError::SelfLoop(a.0)),
        }
    }

    /// Parse the wire form `"<NodeA>,<NodeB>"`.
    ///
    /// Exactly one comma with a non-empty token on each side is accepted.
    pub fn parse_wire(s: &str) -> Result<Self, EdgeKeyError> {
        let mut parts = s.split(',');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), None) => Self::new(a, b),
            _ => Err(EdgeKeyError::Malformed(s.to_string())),
        }
    }

    /// Lexicographically smaller endpoint.
    pub fn low(&self) -> &NodeId {
        &self.low
    }

    /// Lexicographically larger endpoint.
    pub fn high(&self) -> &NodeId {
        &self.high
    }

    /// Whether `node` is one of the endpoints.
    pub fn contains(&self, node: &str) -> bool {
        self.low.as_str() == node || self.high.as_str() == node
    }
}

fn endpoint(id: &str) -> Result<NodeId, EdgeKeyError> {
    if id.is_empty() {
        return Err(EdgeKeyError::EmptyEndpoint);
    }
    NodeId::new(id).ok_or_else(|| EdgeKeyError::InvalidEndpoint(id.to_string()))
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.low, self.high)
    }
}

/// Latest observation for one link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeRecord {
    /// Signal metric as reported (RSSI in dBm, more negative is worse).
    pub metric: i64,

    /// Sender-side time of the measurement, seconds since the Unix epoch.
    pub observed_at: f64,
}

impl EdgeRecord {
    /// Create a record.
    pub fn new(metric: i64, observed_at: f64) -> Self {
        Self {
            metric,
            observed_at,
        }
    }

    /// Routing cost of traversing this link.
    pub fn weight(&self) -> u64 {
        self.metric.unsigned_abs()
    }

    /// Age of the observation relative to `now`.
    pub fn age(&self, now: f64) -> f64 {
        now - self.observed_at
    }

    /// Check whether the record is older than `ttl` seconds at `now`.
    pub fn is_expired(&self, now: f64, ttl: f64) -> bool {
        self.age(now) > ttl
    }

    /// Link quality score in percent, see [`link_quality`].
    pub fn quality(&self) -> f64 {
        link_quality(self.metric)
    }
}

/// Map an RSSI reading onto a 0-100 quality score.
///
/// Linear between [`RSSI_FLOOR_DBM`] and [`RSSI_CEILING_DBM`], clamped outside.
pub fn link_quality(rssi: i64) -> f64 {
    if rssi <= RSSI_FLOOR_DBM {
        return 0.0;
    }
    if rssi >= RSSI_CEILING_DBM {
        return 100.0;
    }
    100.0 * (rssi - RSSI_FLOOR_DBM) as f64 / (RSSI_CEILING_DBM - RSSI_FLOOR_DBM) as f64
}

/// Current wall-clock time in seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
