// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mesh Topology Tracker
//!
//! Keeps a live, undirected link graph for a mesh of radio nodes. Nodes
//! report their links as JSON datagrams over UDP; each link carries a signal
//! metric (RSSI, dBm) and the time it was observed. Links that stop being
//! reported age out, and an operator can query the graph interactively.
//!
//! # Features
//!
//! - **Last-writer-wins merge**: reordered or duplicated reports never roll a
//!   link back to an older observation
//! - **Expiry**: links unseen for the edge timeout are swept periodically
//! - **Routing queries**: cheapest path (weight = |RSSI|) and reachability
//!
//! # Quick Start
//!
//! ```bash
//! # Listen on the default port (6010) with the interactive prompt
//! meshtopo
//!
//! # Simulate a node report
//! meshtopo send --target 127.0.0.1:6010 --sender drone1 --edge drone1,gs:-48
//! ```
//!
//! # Wire Format
//!
//! ```json
//! { "sender": "drone1",
//!   "edges": { "drone1,gs": { "rssi": -48, "timestamp": 1718000000.5 } } }
//! ```

pub mod command;
pub mod config;
pub mod server;

pub use command::{Command, CommandError, CommandLoop};
pub use config::{ConfigError, ServerConfig};
pub use server::{
    EdgeKey, EdgeRecord, EdgeStore, LinkReport, NodeId, ServerError, ShortestPath,
    TopologyQuery, TopologyServer, TopologyStats,
};
