// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topology server configuration.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Shortest accepted expiry sweep period.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Topology server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// UDP port on which node reports arrive (default: 6010)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Age in seconds after which an edge is dropped (default: 15)
    #[serde(default = "default_edge_timeout")]
    pub edge_timeout_secs: f64,

    /// Expiry sweep period in seconds (default: half the edge timeout)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_interval_secs: Option<f64>,

    /// Receive buffer size; longer datagrams are truncated and rejected
    #[serde(default = "default_max_datagram_size")]
    pub max_datagram_size: usize,

    /// Consecutive socket errors after which ingest stops
    #[serde(default = "default_max_receive_errors")]
    pub max_consecutive_receive_errors: u32,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    6010
}

fn default_edge_timeout() -> f64 {
    15.0
}

fn default_max_datagram_size() -> usize {
    MAX_UDP_PAYLOAD
}

fn default_max_receive_errors() -> u32 {
    32
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            edge_timeout_secs: default_edge_timeout(),
            sweep_interval_secs: None,
            max_datagram_size: default_max_datagram_size(),
            max_consecutive_receive_errors: default_max_receive_errors(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Socket address the ingest socket binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Get edge timeout as Duration (saturating; see [`validate`](Self::validate)).
    pub fn edge_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.edge_timeout_secs).unwrap_or(Duration::MAX)
    }

    /// Get sweep interval as Duration, never shorter than [`MIN_SWEEP_INTERVAL`].
    pub fn sweep_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.sweep_interval_secs())
            .unwrap_or(Duration::MAX)
            .max(MIN_SWEEP_INTERVAL)
    }

    fn sweep_interval_secs(&self) -> f64 {
        self.sweep_interval_secs
            .unwrap_or(self.edge_timeout_secs / 2.0)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.edge_timeout_secs <= 0.0
            || Duration::try_from_secs_f64(self.edge_timeout_secs).is_err()
        {
            return Err(ConfigError::InvalidValue(format!(
                "edge_timeout_secs must be a positive number of seconds, got {}",
                self.edge_timeout_secs
            )));
        }
        match Duration::try_from_secs_f64(self.sweep_interval_secs()) {
            Ok(interval) if interval >= MIN_SWEEP_INTERVAL => {}
            _ => {
                return Err(ConfigError::InvalidValue(format!(
                    "sweep interval must be at least {:?}, got {}s",
                    MIN_SWEEP_INTERVAL,
                    self.sweep_interval_secs()
                )))
            }
        }
        if self.max_datagram_size < 64 || self.max_datagram_size > MAX_UDP_PAYLOAD {
            return Err(ConfigError::InvalidValue(format!(
                "max_datagram_size must be within 64..={}",
                MAX_UDP_PAYLOAD
            )));
        }
        if self.max_consecutive_receive_errors == 0 {
            return Err(ConfigError::InvalidValue(
                "max_consecutive_receive_errors cannot be 0".into(),
            ));
        }
        Ok(())
    }
}
