// src/config.rs

//! Manages server configuration: loading, resolving derived values, and validation.

use crate::connection::ConnectionSettings;
use crate::core::protocol::FramingPolicy;
use crate::core::protocol::codec::{DEFAULT_MAX_LINE, MAX_READ_CHUNK};
use crate::server::ServerMode;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::warn;

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    8879
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    7878
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    1024
}
fn default_read_chunk_bytes() -> usize {
    MAX_READ_CHUNK
}
fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE
}

/// A raw representation of the config file before validation and resolution.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    mode: ServerMode,
    framing: Option<FramingPolicy>,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_max_clients")]
    max_clients: usize,
    #[serde(default = "default_read_chunk_bytes")]
    read_chunk_bytes: usize,
    #[serde(default = "default_max_line_bytes")]
    max_line_bytes: usize,
    #[serde(default)]
    idle_timeout_secs: u64,
    #[serde(default)]
    metrics: MetricsConfig,
}

/// Represents the final, validated server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    /// `0` asks the operating system for an ephemeral port.
    pub port: u16,
    pub mode: ServerMode,
    /// Overrides the framing policy implied by `mode`.
    pub framing: Option<FramingPolicy>,
    pub log_level: String,
    /// Concurrent connection cap in multi-client mode.
    pub max_clients: usize,
    pub read_chunk_bytes: usize,
    pub max_line_bytes: usize,
    /// `0` disables the idle timeout.
    pub idle_timeout_secs: u64,
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            mode: ServerMode::default(),
            framing: None,
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            read_chunk_bytes: default_read_chunk_bytes(),
            max_line_bytes: default_max_line_bytes(),
            idle_timeout_secs: 0,
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid configuration in '{path}'"))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let raw_config: RawConfig =
            toml::from_str(contents).context("Failed to parse configuration TOML")?;

        let config = Config {
            host: raw_config.host,
            port: raw_config.port,
            mode: raw_config.mode,
            framing: raw_config.framing,
            log_level: raw_config.log_level,
            max_clients: raw_config.max_clients,
            read_chunk_bytes: raw_config.read_chunk_bytes,
            max_line_bytes: raw_config.max_line_bytes,
            idle_timeout_secs: raw_config.idle_timeout_secs,
            metrics: raw_config.metrics,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if !(1..=MAX_READ_CHUNK).contains(&self.read_chunk_bytes) {
            return Err(anyhow!(
                "read_chunk_bytes must be between 1 and {}, got {}",
                MAX_READ_CHUNK,
                self.read_chunk_bytes
            ));
        }
        if self.max_line_bytes < self.read_chunk_bytes {
            return Err(anyhow!(
                "max_line_bytes ({}) cannot be smaller than read_chunk_bytes ({})",
                self.max_line_bytes,
                self.read_chunk_bytes
            ));
        }

        if self.mode == ServerMode::Single && self.max_clients != default_max_clients() {
            warn!("max_clients is ignored in single-client mode.");
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.port != 0 && self.metrics.port == self.port {
                return Err(anyhow!(
                    "metrics.port ({}) cannot be the same as the server port",
                    self.metrics.port
                ));
            }
        }

        Ok(())
    }

    /// The framing policy in effect: the explicit override, or the mode's default.
    pub fn framing(&self) -> FramingPolicy {
        self.framing.unwrap_or_else(|| self.mode.default_framing())
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// The settings every accepted connection is created with.
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            framing: self.framing(),
            read_chunk_bytes: self.read_chunk_bytes,
            max_line_bytes: self.max_line_bytes,
            idle_timeout: self.idle_timeout(),
        }
    }
}
