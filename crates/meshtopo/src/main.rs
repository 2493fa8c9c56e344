// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mesh Topology Tracker CLI
//!
//! Ground-station service that collects link reports from mesh nodes and
//! answers topology queries from an interactive prompt.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port (6010)
//! meshtopo
//!
//! # Custom timeout, no prompt
//! meshtopo --edge-timeout 30 --headless
//!
//! # Using configuration file
//! meshtopo --config meshtopo.json
//!
//! # Emit one report as node "drone1"
//! meshtopo send --target 127.0.0.1:6010 --sender drone1 \
//!     --edge drone1,gs:-48 --edge drone1,drone2:-71
//! ```

use clap::{Parser, Subcommand};
use meshtopo::server::unix_now;
use meshtopo::{
    CommandLoop, EdgeKey, EdgeRecord, LinkReport, NodeId, ServerConfig, ServerError,
    TopologyServer,
};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use tokio::io::BufReader;
use tokio::net::UdpSocket;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Mesh Topology Tracker
#[derive(Parser, Debug)]
#[command(name = "meshtopo")]
#[command(about = "Mesh Topology Tracker - live link graph from node reports")]
#[command(version)]
struct Args {
    /// UDP port to listen on
    #[arg(short, long, default_value = "6010")]
    port: u16,

    /// Bind address (0.0.0.0 for all interfaces)
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Configuration file (JSON format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds after which an unreported link is dropped
    #[arg(long, default_value = "15")]
    edge_timeout: f64,

    /// Expiry sweep period in seconds (default: half the edge timeout)
    #[arg(long)]
    sweep_interval: Option<f64>,

    /// Run without the interactive prompt, until Ctrl+C
    #[arg(long)]
    headless: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the tracker (default)
    Serve,

    /// Send one link report, acting as a mesh node
    Send {
        /// Tracker address
        #[arg(short, long, default_value = "127.0.0.1:6010")]
        target: SocketAddr,

        /// Reporting node id
        #[arg(short, long)]
        sender: String,

        /// Link measurement (format: "A,B:RSSI", can repeat)
        #[arg(short, long = "edge", required = true)]
        edges: Vec<String>,

        /// Observation time in Unix seconds (default: now)
        #[arg(long)]
        timestamp: Option<f64>,
    },

    /// Generate default configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "meshtopo.json")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = Args::parse();

    // Initialize logging; stdout belongs to the prompt
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match args.command.take() {
        Some(Commands::Send {
            target,
            sender,
            edges,
            timestamp,
        }) => cmd_send(target, &sender, &edges, timestamp).await,
        Some(Commands::GenConfig { output }) => cmd_gen_config(&output),
        Some(Commands::Validate { config }) => cmd_validate(&config),
        Some(Commands::Serve) | None => {
            let code = match cmd_serve(&args).await {
                Ok(()) => 0,
                Err(e) => {
                    error!("{}", e);
                    1
                }
            };
            // A pending stdin read would otherwise hold the runtime open.
            std::process::exit(code);
        }
    }
}

fn build_config(args: &Args) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from {:?}", config_path);
        return Ok(ServerConfig::from_file(config_path)?);
    }

    let config = ServerConfig {
        bind_address: args.bind,
        port: args.port,
        edge_timeout_secs: args.edge_timeout,
        sweep_interval_secs: args.sweep_interval,
        ..Default::default()
    };
    config.validate()?;
    Ok(config)
}

async fn cmd_serve(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(args)?;
    let server = TopologyServer::bind(config).await?;
    let addr = server.local_addr()?;

    info!("+----------------------------------------------------+");
    info!(
        "|       Mesh Topology Tracker v{}                 |",
        env!("CARGO_PKG_VERSION")
    );
    info!("+----------------------------------------------------+");
    info!("|  Bind:    {:40} |", addr);
    info!(
        "|  Timeout: {:40} |",
        format!("{}s", server.config().edge_timeout_secs)
    );
    info!(
        "|  Sweep:   {:40} |",
        format!("{:.1}s", server.config().sweep_interval().as_secs_f64())
    );
    info!(
        "|  Mode:    {:40} |",
        if args.headless { "headless" } else { "interactive" }
    );
    info!("+----------------------------------------------------+");

    let runner = server.clone();
    let mut server_task = tokio::spawn(async move { runner.run().await });
    let mut server_done = false;
    let mut failure: Option<ServerError> = None;

    if args.headless {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping tracker...");
            }
            res = &mut server_task => {
                server_done = true;
                failure = task_failure(res);
            }
        }
    } else {
        let command_loop = CommandLoop::new(server.query(), server.stats().clone());
        let prompt = command_loop.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout());
        tokio::pin!(prompt);

        loop {
            tokio::select! {
                res = &mut prompt => {
                    if let Err(e) = res {
                        warn!("Command loop stopped on I/O error: {}", e);
                    }
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping tracker...");
                    break;
                }
                res = &mut server_task, if !server_done => {
                    server_done = true;
                    failure = task_failure(res);
                    if failure.is_some() {
                        warn!("No longer receiving reports; queries use the remaining graph");
                    } else {
                        break;
                    }
                }
            }
        }
    }

    server.shutdown();
    if !server_done {
        failure = task_failure(server_task.await);
    }

    let stats = server.stats().snapshot();
    info!(
        "Tracker stopped: {} datagrams ({} rejected), {} edges expired",
        stats.datagrams_received, stats.datagrams_rejected, stats.edges_expired
    );

    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn task_failure(
    res: Result<Result<(), ServerError>, tokio::task::JoinError>,
) -> Option<ServerError> {
    match res {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(e) => Some(ServerError::Io(std::io::Error::other(e))),
    }
}

async fn cmd_send(
    target: SocketAddr,
    sender: &str,
    edges: &[String],
    timestamp: Option<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let sender = NodeId::new(sender).ok_or("sender must be non-empty with no whitespace")?;
    let observed_at = timestamp.unwrap_or_else(unix_now);

    let mut report = LinkReport::new(sender);
    for arg in edges {
        let (key, rssi) = parse_edge_arg(arg)?;
        report = report.with_edge(key, EdgeRecord::new(rssi, observed_at));
    }
    let payload = report.encode()?;

    let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(local).await?;
    socket.send_to(&payload, target).await?;

    println!(
        "Sent {} edge(s) from {} to {} ({} bytes)",
        report.edges.len(),
        report.sender,
        target,
        payload.len()
    );
    Ok(())
}

/// Parse `A,B:RSSI`.
fn parse_edge_arg(arg: &str) -> Result<(EdgeKey, i64), String> {
    let (key, rssi) = arg
        .rsplit_once(':')
        .ok_or_else(|| format!("invalid edge `{}` (expected A,B:RSSI)", arg))?;
    let key = EdgeKey::parse_wire(key).map_err(|e| format!("invalid edge `{}`: {}", arg, e))?;
    let rssi = rssi
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid RSSI in `{}`: {}", arg, e))?;
    Ok((key, rssi))
}

fn cmd_gen_config(output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    ServerConfig::default().to_file(output)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    match ServerConfig::from_file(config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Listen:  {}", config.listen_addr());
            println!("Timeout: {}s", config.edge_timeout_secs);
            println!("Sweep:   {:.1}s", config.sweep_interval().as_secs_f64());
            println!("Buffer:  {} bytes", config.max_datagram_size);
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}
