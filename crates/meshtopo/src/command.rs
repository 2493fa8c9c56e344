// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Operator command loop.
//!
//! One command per line:
//!
//! | Command             | Effect                                   |
//! |---------------------|------------------------------------------|
//! | `map`               | all live edges with RSSI, quality, age   |
//! | `nodes`             | nodes with at least one live edge        |
//! | `bfs <start>`       | nodes reachable from `start`             |
//! | `path <start> <end>`| cheapest path and its cost               |
//! | `stats`             | ingest and expiry counters               |
//! | `help`              | this list                                |
//! | `exit`              | leave the loop                           |

use crate::server::{unix_now, TopologyQuery, TopologyStats};
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const PROMPT: &str = "meshtopo> ";

const HELP: &str = "\
Available commands:
  map                          - show every live link
  nodes                        - list nodes with live links
  bfs <start_node>             - list nodes reachable from a node
  path <start_node> <end_node> - cheapest path between two nodes
  stats                        - ingest and expiry counters
  help                         - show this list
  exit                         - leave the command loop
";

/// Command parse errors, shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unknown command: {0} (type `help` for a list)")]
    Unknown(String),
}

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Map,
    Nodes,
    Bfs { start: String },
    Path { start: String, end: String },
    Stats,
    Help,
    Exit,
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let cmd = match (name, args.as_slice()) {
            ("map", []) => Self::Map,
            ("map", _) => return Err(CommandError::Usage("map")),
            ("nodes", []) => Self::Nodes,
            ("nodes", _) => return Err(CommandError::Usage("nodes")),
            ("bfs", [start]) => Self::Bfs {
                start: start.to_string(),
            },
            ("bfs", _) => return Err(CommandError::Usage("bfs <start_node>")),
            ("path", [start, end]) => Self::Path {
                start: start.to_string(),
                end: end.to_string(),
            },
            ("path", _) => return Err(CommandError::Usage("path <start_node> <end_node>")),
            ("stats", []) => Self::Stats,
            ("stats", _) => return Err(CommandError::Usage("stats")),
            ("help", []) => Self::Help,
            ("help", _) => return Err(CommandError::Usage("help")),
            ("exit", []) => Self::Exit,
            ("exit", _) => return Err(CommandError::Usage("exit")),
            (other, _) => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(cmd))
    }
}

/// Synchronous request/response front end over the live topology.
pub struct CommandLoop {
    query: TopologyQuery,
    stats: Arc<TopologyStats>,
}

impl CommandLoop {
    /// Create a command loop.
    pub fn new(query: TopologyQuery, stats: Arc<TopologyStats>) -> Self {
        Self { query, stats }
    }

    /// Read commands from `reader` until `exit` or end of input.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        writer.write_all(HELP.as_bytes()).await?;

        loop {
            writer.write_all(PROMPT.as_bytes()).await?;
            writer.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };

            let output = match Command::parse(&line) {
                Ok(None) => continue,
                Ok(Some(Command::Exit)) => break,
                Ok(Some(cmd)) => self.execute(&cmd, unix_now()),
                Err(e) => format!("  {}\n", e),
            };
            writer.write_all(output.as_bytes()).await?;
        }

        writer.flush().await
    }

    /// Execute one command against the current topology, `now` being the
    /// reference time for edge ages.
    pub fn execute(&self, cmd: &Command, now: f64) -> String {
        match cmd {
            Command::Map => self.render_map(now),
            Command::Nodes => self.render_nodes(),
            Command::Bfs { start } => self.render_bfs(start),
            Command::Path { start, end } => self.render_path(start, end),
            Command::Stats => self.render_stats(),
            Command::Help => HELP.to_string(),
            Command::Exit => String::new(),
        }
    }

    fn render_map(&self, now: f64) -> String {
        let mut out = String::from("--- network map ---\n");
        let edges = self.query.store().list_sorted();
        if edges.is_empty() {
            out.push_str("  (no link reports received)\n");
        }
        for (key, record) in edges {
            let _ = writeln!(
                out,
                "  - {:<10} <--> {:<10} | RSSI: {:<4} | quality: {:5.1}% | updated: {:.1}s ago",
                key.low(),
                key.high(),
                record.metric,
                record.quality(),
                record.age(now)
            );
        }
        out
    }

    fn render_nodes(&self) -> String {
        let nodes = self.query.active_nodes();
        let mut out = String::from("--- active nodes ---\n");
        if nodes.is_empty() {
            out.push_str("  (none)\n");
        } else {
            let names: Vec<&str> = nodes.iter().map(|n| n.as_str()).collect();
            let _ = writeln!(out, "  {}", names.join(", "));
        }
        out
    }

    fn render_bfs(&self, start: &str) -> String {
        let reachable = self.query.reachable(start);
        let mut out = format!("--- nodes reachable from {} (BFS) ---\n", start);
        if reachable.is_empty() {
            let _ = writeln!(out, "  {} has no live links", start);
        } else {
            let names: Vec<&str> = reachable.iter().map(|n| n.as_str()).collect();
            let _ = writeln!(out, "  -> {}", names.join(" -> "));
        }
        out
    }

    fn render_path(&self, start: &str, end: &str) -> String {
        let result = self.query.shortest_path(start, end);
        let mut out = format!("--- best path ({} -> {}) ---\n", start, end);
        match &result.path {
            Some(path) => {
                let names: Vec<&str> = path.iter().map(|n| n.as_str()).collect();
                let _ = writeln!(out, "  path: {}", names.join(" -> "));
                let _ = writeln!(out, "  total cost (lower is better): {}", result.cost);
            }
            None => out.push_str("  no path\n"),
        }
        out
    }

    fn render_stats(&self) -> String {
        let s = self.stats.snapshot();
        let mut out = String::from("--- statistics ---\n");
        let _ = writeln!(
            out,
            "  datagrams: {} received ({:.1}/s), {} accepted, {} rejected",
            s.datagrams_received,
            s.datagrams_per_second(),
            s.datagrams_accepted(),
            s.datagrams_rejected
        );
        let _ = writeln!(
            out,
            "  edges: {} new, {} refreshed, {} stale, {} expired",
            s.edges_inserted, s.edges_refreshed, s.edges_stale, s.edges_expired
        );
        let _ = writeln!(
            out,
            "  live edges: {}, sweeps: {}, receive errors: {}, uptime: {}s",
            self.query.store().len(),
            s.sweeps,
            s.receive_errors,
            s.uptime_secs
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{EdgeKey, EdgeRecord, EdgeStore};

    fn command_loop(edges: &[(&str, &str, i64, f64)]) -> CommandLoop {
        let store = Arc::new(EdgeStore::new());
        for (a, b, metric, ts) in edges {
            store.upsert(EdgeKey::new(a, b).unwrap(), EdgeRecord::new(*metric, *ts));
        }
        CommandLoop::new(TopologyQuery::new(store), Arc::new(TopologyStats::new()))
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("map"), Ok(Some(Command::Map)));
        assert_eq!(Command::parse("  nodes  "), Ok(Some(Command::Nodes)));
        assert_eq!(
            Command::parse("bfs gs"),
            Ok(Some(Command::Bfs { start: "gs".into() }))
        );
        assert_eq!(
            Command::parse("path d1 gs"),
            Ok(Some(Command::Path {
                start: "d1".into(),
                end: "gs".into()
            }))
        );
        assert_eq!(Command::parse("exit"), Ok(Some(Command::Exit)));
        assert_eq!(Command::parse(""), Ok(None));
        assert_eq!(Command::parse("   "), Ok(None));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Command::parse("bfs"),
            Err(CommandError::Usage("bfs <start_node>"))
        );
        assert_eq!(
            Command::parse("path a"),
            Err(CommandError::Usage("path <start_node> <end_node>"))
        );
        assert!(matches!(
            Command::parse("path a b c"),
            Err(CommandError::Usage(_))
        ));
        assert_eq!(Command::parse("help me"), Err(CommandError::Usage("help")));
        assert_eq!(Command::parse("exit now"), Err(CommandError::Usage("exit")));
        assert_eq!(
            Command::parse("quit"),
            Err(CommandError::Unknown("quit".into()))
        );
        assert_eq!(
            Command::parse("teleport"),
            Err(CommandError::Unknown("teleport".into()))
        );
    }

    #[test]
    fn test_map_output() {
        let cl = command_loop(&[("gs", "d1", -40, 100.0), ("d1", "d2", -70, 98.0)]);
        let out = cl.execute(&Command::Map, 102.0);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("d1") && lines[1].contains("d2"));
        assert!(lines[1].contains("RSSI: -70"));
        assert!(lines[1].contains("50.0%"));
        assert!(lines[1].contains("4.0s ago"));
        assert!(lines[2].contains("gs") && lines[2].contains("100.0%"));
    }

    #[test]
    fn test_empty_outputs() {
        let cl = command_loop(&[]);
        assert!(cl.execute(&Command::Map, 0.0).contains("no link reports"));
        assert!(cl.execute(&Command::Nodes, 0.0).contains("(none)"));
        assert!(cl
            .execute(&Command::Bfs { start: "x".into() }, 0.0)
            .contains("x has no live links"));
    }

    #[test]
    fn test_path_output() {
        let cl = command_loop(&[("N1", "N2", -40, 100.0), ("N2", "N3", -60, 100.0)]);
        let out = cl.execute(
            &Command::Path {
                start: "N1".into(),
                end: "N3".into(),
            },
            100.0,
        );
        assert!(out.contains("path: N1 -> N2 -> N3"));
        assert!(out.contains("total cost (lower is better): 100"));

        let out = cl.execute(
            &Command::Path {
                start: "N1".into(),
                end: "N9".into(),
            },
            100.0,
        );
        assert!(out.contains("no path"));
    }

    #[test]
    fn test_nodes_and_bfs_output() {
        let cl = command_loop(&[("b", "a", -40, 1.0), ("c", "b", -40, 1.0)]);
        assert!(cl.execute(&Command::Nodes, 1.0).contains("  a, b, c"));

        let out = cl.execute(&Command::Bfs { start: "a".into() }, 1.0);
        assert!(out.contains("-> a -> b -> c"));
    }

    #[tokio::test]
    async fn test_run_until_exit() {
        let cl = command_loop(&[("N1", "N2", -40, unix_now())]);
        let input: &[u8] = b"nodes\n\nbogus\nbfs\npath N1 N2\nexit\nnodes\n";
        let mut output = Vec::new();

        cl.run(input, &mut output).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("N1, N2"));
        assert!(text.contains("unknown command: bogus"));
        assert!(text.contains("usage: bfs <start_node>"));
        assert!(text.contains("path: N1 -> N2"));
        // nothing after `exit` is executed
        assert_eq!(text.matches("--- active nodes ---").count(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_at_eof() {
        let cl = command_loop(&[]);
        let input: &[u8] = b"stats";
        let mut output = Vec::new();

        cl.run(input, &mut output).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("--- statistics ---"));
        assert!(text.contains("live edges: 0"));
    }
}
