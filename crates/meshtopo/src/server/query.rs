// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read-only topology queries.
//!
//! Every query takes a fresh snapshot of the [`EdgeStore`] and works on that
//! copy, so a traversal never observes the graph changing under it and the
//! store lock is never held during graph work. Results are not cached: the
//! graph changes continuously.
//!
//! An unknown node is an expected condition (nodes vanish once their edges
//! expire) and is reported through empty results, never through errors.

use super::edge::{EdgeKey, EdgeRecord, NodeId};
use super::store::EdgeStore;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Undirected weighted adjacency: node -> (neighbor, weight).
pub type Adjacency = HashMap<NodeId, Vec<(NodeId, u64)>>;

/// Derive the adjacency of a snapshot, weight = |metric|, both directions.
pub fn build_adjacency(snapshot: &HashMap<EdgeKey, EdgeRecord>) -> Adjacency {
    let mut adj: Adjacency = HashMap::new();
    for (key, record) in snapshot {
        let weight = record.weight();
        adj.entry(key.low().clone())
            .or_default()
            .push((key.high().clone(), weight));
        adj.entry(key.high().clone())
            .or_default()
            .push((key.low().clone(), weight));
    }
    // Snapshot iteration order is arbitrary; traversals should not be.
    for neighbors in adj.values_mut() {
        neighbors.sort();
    }
    adj
}

/// Result of a shortest-path query.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPath {
    /// Nodes from start to end inclusive, `None` when unreachable.
    pub path: Option<Vec<NodeId>>,

    /// Sum of link weights along `path`, `+inf` when unreachable.
    pub cost: f64,
}

impl ShortestPath {
    /// The "no path" result.
    pub fn unreachable() -> Self {
        Self {
            path: None,
            cost: f64::INFINITY,
        }
    }

    /// Whether a path was found.
    pub fn is_found(&self) -> bool {
        self.path.is_some()
    }

    /// Number of links traversed, if a path was found.
    pub fn hops(&self) -> Option<usize> {
        self.path.as_ref().map(|p| p.len().saturating_sub(1))
    }
}

// Min-heap entry. `seq` breaks cost ties in insertion order so node ids are
// never compared.
struct Frontier<'a> {
    cost: u64,
    seq: u64,
    node: &'a str,
}

impl PartialEq for Frontier<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.seq == other.seq
    }
}

impl Eq for Frontier<'_> {}

impl Ord for Frontier<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for min-heap
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Frontier<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Query front end over a shared [`EdgeStore`].
#[derive(Debug, Clone)]
pub struct TopologyQuery {
    store: Arc<EdgeStore>,
}

impl TopologyQuery {
    /// Create a query handle.
    pub fn new(store: Arc<EdgeStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<EdgeStore> {
        &self.store
    }

    /// Adjacency of the current snapshot.
    pub fn adjacency(&self) -> Adjacency {
        build_adjacency(&self.store.snapshot())
    }

    /// Node ids that currently have at least one live edge, sorted.
    pub fn active_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.adjacency().into_keys().collect();
        nodes.sort();
        nodes
    }

    /// Dijkstra shortest path from `start` to `end`.
    pub fn shortest_path(&self, start: &str, end: &str) -> ShortestPath {
        shortest_path_in(&self.adjacency(), start, end)
    }

    /// Breadth-first visitation order from `start`.
    pub fn reachable(&self, start: &str) -> Vec<NodeId> {
        reachable_in(&self.adjacency(), start)
    }
}

/// Dijkstra over a prepared adjacency.
pub fn shortest_path_in(adj: &Adjacency, start: &str, end: &str) -> ShortestPath {
    let (Some((start, _)), Some((end, _))) = (adj.get_key_value(start), adj.get_key_value(end))
    else {
        return ShortestPath::unreachable();
    };
    let (start, end) = (start.as_str(), end.as_str());

    let mut dist: HashMap<&str, u64> = HashMap::new();
    let mut prev: HashMap<&str, &str> = HashMap::new();
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;

    dist.insert(start, 0);
    heap.push(Frontier {
        cost: 0,
        seq,
        node: start,
    });

    while let Some(Frontier { cost, node, .. }) = heap.pop() {
        if cost > dist.get(node).copied().unwrap_or(u64::MAX) {
            continue;
        }
        if node == end {
            break;
        }

        for (neighbor, weight) in adj.get(node).map(Vec::as_slice).unwrap_or_default() {
            let next = cost.saturating_add(*weight);
            let known = dist.get(neighbor.as_str()).copied().unwrap_or(u64::MAX);
            if next < known {
                dist.insert(neighbor.as_str(), next);
                prev.insert(neighbor.as_str(), node);
                seq += 1;
                heap.push(Frontier {
                    cost: next,
                    seq,
                    node: neighbor.as_str(),
                });
            }
        }
    }

    let Some(&total) = dist.get(end) else {
        return ShortestPath::unreachable();
    };

    let mut path = vec![end];
    let mut current = end;
    while let Some(&p) = prev.get(current) {
        path.push(p);
        current = p;
    }
    if current != start {
        return ShortestPath::unreachable();
    }
    path.reverse();

    ShortestPath {
        path: Some(
            path.into_iter()
                .filter_map(|id| adj.get_key_value(id).map(|(k, _)| k.clone()))
                .collect(),
        ),
        cost: total as f64,
    }
}

/// Breadth-first traversal over a prepared adjacency.
pub fn reachable_in(adj: &Adjacency, start: &str) -> Vec<NodeId> {
    let Some((start, _)) = adj.get_key_value(start) else {
        return Vec::new();
    };

    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&NodeId> = VecDeque::new();
    let mut order = Vec::new();

    visited.insert(start.as_str());
    queue.push_back(start);

    while let Some(node) = queue.pop_front() {
        order.push(node.clone());
        for (neighbor, _) in adj.get(node.as_str()).map(Vec::as_slice).unwrap_or_default() {
            if visited.insert(neighbor.as_str()) {
                queue.push_back(neighbor);
            }
        }
    }

    order
}
