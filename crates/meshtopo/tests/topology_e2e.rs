// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::float_cmp)] // Test assertions with constants
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure
#![allow(clippy::too_many_lines)] // Example/test code
#![allow(clippy::items_after_statements)] // Test helpers

//! End-to-end tracker tests
//!
//! Drives a live `TopologyServer` on loopback with real UDP reports and
//! checks what the query side observes.

use meshtopo::server::{unix_now, EdgeKey, EdgeRecord, LinkReport, NodeId};
use meshtopo::{CommandLoop, ServerConfig, ServerError, TopologyServer};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

fn loopback_config(edge_timeout_secs: f64, sweep_interval_secs: f64) -> ServerConfig {
    ServerConfig {
        bind_address: "127.0.0.1".parse().unwrap(),
        port: 0,
        edge_timeout_secs,
        sweep_interval_secs: Some(sweep_interval_secs),
        ..Default::default()
    }
}

async fn start(config: ServerConfig) -> (TopologyServer, JoinHandle<Result<(), ServerError>>) {
    let server = TopologyServer::bind(config).await.unwrap();
    let runner = server.clone();
    let task = tokio::spawn(async move { runner.run().await });
    (server, task)
}

async fn stop(server: &TopologyServer, task: JoinHandle<Result<(), ServerError>>) {
    server.shutdown();
    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

fn report(sender: &str, edges: &[(&str, &str, i64, f64)]) -> Vec<u8> {
    let mut report = LinkReport::new(NodeId::new(sender).unwrap());
    for (a, b, rssi, ts) in edges {
        report = report.with_edge(EdgeKey::new(a, b).unwrap(), EdgeRecord::new(*rssi, *ts));
    }
    report.encode().unwrap()
}

async fn send(addr: SocketAddr, payload: &[u8]) {
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(payload, addr).await.unwrap();
}

#[tokio::test]
async fn test_reports_build_routable_graph_then_expire() {
    let (server, task) = start(loopback_config(1.0, 0.1)).await;
    let addr = server.local_addr().unwrap();
    let now = unix_now();

    send(addr, &report("N1", &[("N1", "N2", -40, now)])).await;
    send(addr, &report("N2", &[("N2", "N3", -60, now)])).await;
    assert!(wait_until(|| server.store().len() == 2).await);

    let query = server.query();
    let result = query.shortest_path("N1", "N3");
    let path: Vec<&str> = result
        .path
        .as_ref()
        .unwrap()
        .iter()
        .map(|n| n.as_str())
        .collect();
    assert_eq!(path, ["N1", "N2", "N3"]);
    assert_eq!(result.cost, 100.0);

    let reachable: Vec<String> = query
        .reachable("N3")
        .into_iter()
        .map(|n| n.as_str().to_string())
        .collect();
    assert_eq!(reachable, ["N3", "N2", "N1"]);

    // Nothing refreshes the links, so they age out
    assert!(wait_until(|| server.store().is_empty()).await);
    let result = query.shortest_path("N1", "N3");
    assert!(result.path.is_none());
    assert!(result.cost.is_infinite());
    assert!(query.active_nodes().is_empty());
    assert!(server.stats().snapshot().edges_expired >= 2);

    stop(&server, task).await;
}

#[tokio::test]
async fn test_reordered_reports_keep_newest() {
    let (server, task) = start(loopback_config(3600.0, 60.0)).await;
    let addr = server.local_addr().unwrap();
    let now = unix_now();
    let key = EdgeKey::new("a", "b").unwrap();

    send(addr, &report("a", &[("a", "b", -45, now)])).await;
    assert!(wait_until(|| server.store().get(&key).is_some()).await);

    // Older observation from the other end arrives late
    send(addr, &report("b", &[("b", "a", -88, now - 5.0)])).await;
    assert!(wait_until(|| server.stats().snapshot().edges_stale == 1).await);
    assert_eq!(server.store().get(&key).unwrap().metric, -45);

    send(addr, &report("b", &[("b", "a", -52, now + 1.0)])).await;
    assert!(wait_until(|| server.store().get(&key).map(|r| r.metric) == Some(-52)).await);
    assert_eq!(server.store().len(), 1);

    stop(&server, task).await;
}

#[tokio::test]
async fn test_bad_datagrams_are_dropped_whole() {
    let (server, task) = start(loopback_config(3600.0, 60.0)).await;
    let addr = server.local_addr().unwrap();
    let now = unix_now();

    send(addr, b"\xff\xfe not json").await;
    send(
        addr,
        format!(
            r#"{{"sender":"x","edges":{{"x,y":{{"rssi":-40,"timestamp":{now}}},"x,x":{{"rssi":-40,"timestamp":{now}}}}}}}"#
        )
        .as_bytes(),
    )
    .await;
    send(
        addr,
        format!(r#"{{"edges":{{"x,y":{{"rssi":-40,"timestamp":{now}}}}}}}"#).as_bytes(),
    )
    .await;
    send(addr, &report("x", &[("x", "y", -40, now)])).await;

    assert!(wait_until(|| server.stats().snapshot().datagrams_received == 4).await);
    let stats = server.stats().snapshot();
    assert_eq!(stats.datagrams_rejected, 3);
    assert_eq!(stats.edges_inserted, 1);
    assert_eq!(server.store().len(), 1);

    stop(&server, task).await;
}

#[tokio::test]
async fn test_second_run_is_rejected() {
    let (server, task) = start(loopback_config(3600.0, 60.0)).await;
    assert!(wait_until(|| server.is_running()).await);

    let err = server.run().await.unwrap_err();
    assert!(matches!(err, ServerError::AlreadyRunning));

    stop(&server, task).await;
    assert!(!server.is_running());
}

#[tokio::test]
async fn test_command_loop_over_live_server() {
    let (server, task) = start(loopback_config(3600.0, 60.0)).await;
    let addr = server.local_addr().unwrap();
    let now = unix_now();

    send(
        addr,
        &report("gs", &[("gs", "d1", -48, now), ("gs", "d2", -81, now)]),
    )
    .await;
    assert!(wait_until(|| server.store().len() == 2).await);

    let command_loop = CommandLoop::new(server.query(), server.stats().clone());
    let input: &[u8] = b"map\nnodes\npath d1 d2\nbfs gs\nstats\nexit\n";
    let mut output = Vec::new();
    command_loop.run(input, &mut output).await.unwrap();

    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("RSSI: -48"));
    assert!(text.contains("d1, d2, gs"));
    assert!(text.contains("path: d1 -> gs -> d2"));
    assert!(text.contains("total cost (lower is better): 129"));
    assert!(text.contains("-> gs -> d1 -> d2"));
    assert!(text.contains("1 accepted"));

    stop(&server, task).await;
}
