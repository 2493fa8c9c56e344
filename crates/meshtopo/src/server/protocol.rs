// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Link report wire protocol.
//!
//! Each datagram carries one UTF-8 JSON report from a mesh node:
//!
//! ```text
//! {
//!   "sender": "<NodeId>",
//!   "edges": {
//!     "<NodeA>,<NodeB>": { "rssi": <integer>, "timestamp": <number> },
//!     ...
//!   }
//! }
//! ```
//!
//! Decoding is all-or-nothing: a single bad edge rejects the whole report.
//! The protocol is fire-and-forget, so nothing is ever sent back.

use super::edge::{EdgeKey, EdgeKeyError, EdgeRecord, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Metric assumed for an edge that omits `rssi`.
pub const DEFAULT_RSSI: i64 = -100;

/// Wire format of a node report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkReportWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    #[serde(default)]
    pub edges: BTreeMap<String, EdgeReportWire>,
}

/// Wire format of one edge measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeReportWire {
    #[serde(default = "default_rssi")]
    pub rssi: i64,
    pub timestamp: f64,
}

fn default_rssi() -> i64 {
    DEFAULT_RSSI
}

/// A successfully decoded report, ready to merge.
#[derive(Debug, Clone)]
pub struct LinkReport {
    pub sender: NodeId,
    pub edges: Vec<(EdgeKey, EdgeRecord)>,
}

impl LinkReport {
    /// Start a report from `sender` with no edges.
    pub fn new(sender: NodeId) -> Self {
        Self {
            sender,
            edges: Vec::new(),
        }
    }

    /// Add one edge measurement.
    pub fn with_edge(mut self, key: EdgeKey, record: EdgeRecord) -> Self {
        self.edges.push((key, record));
        self
    }

    /// Decode a datagram payload.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(payload).map_err(|_| DecodeError::InvalidUtf8)?;
        let wire: LinkReportWire =
            serde_json::from_str(text).map_err(|e| DecodeError::Json(e.to_string()))?;
        wire.try_into()
    }

    /// Encode as a datagram payload.
    pub fn encode(&self) -> Result<Vec<u8>, DecodeError> {
        let wire = LinkReportWire::from(self);
        serde_json::to_vec(&wire).map_err(|e| DecodeError::Json(e.to_string()))
    }
}

impl TryFrom<LinkReportWire> for LinkReport {
    type Error = DecodeError;

    fn try_from(wire: LinkReportWire) -> Result<Self, Self::Error> {
        let sender = match wire.sender {
            None => return Err(DecodeError::MissingSender),
            Some(s) if s.is_empty() => return Err(DecodeError::MissingSender),
            Some(s) => NodeId::new(s.as_str()).ok_or(DecodeError::InvalidSender(s))?,
        };

        let mut edges = Vec::with_capacity(wire.edges.len());
        for (key_str, edge) in wire.edges {
            if !edge.timestamp.is_finite() {
                return Err(DecodeError::InvalidTimestamp(key_str));
            }
            let key = EdgeKey::parse_wire(&key_str)?;
            edges.push((key, EdgeRecord::new(edge.rssi, edge.timestamp)));
        }

        Ok(Self { sender, edges })
    }
}

impl From<&LinkReport> for LinkReportWire {
    fn from(report: &LinkReport) -> Self {
        Self {
            sender: Some(report.sender.to_string()),
            edges: report
                .edges
                .iter()
                .map(|(key, rec)| {
                    (
                        key.to_string(),
                        EdgeReportWire {
                            rssi: rec.metric,
                            timestamp: rec.observed_at,
                        },
                    )
                })
                .collect(),
        }
    }
}

/// Reasons a datagram is discarded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid report: {0}")]
    Json(String),

    #[error("report has no sender")]
    MissingSender,

    #[error("sender {0:?} contains whitespace or control characters")]
    InvalidSender(String),

    #[error("invalid edge key: {0}")]
    InvalidEdgeKey(#[from] EdgeKeyError),

    #[error("edge {0} has a non-finite timestamp")]
    InvalidTimestamp(String),
}
