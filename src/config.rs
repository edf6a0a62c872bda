//! Configuration parsing for the Tidings server.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Sensible defaults for quick start

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::service::broadcaster::BroadcasterConfig;
use crate::store::StoreConfig;

/// Where notification history is kept.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process memory; history is lost on restart.
    Memory,
    /// SQLite database under the data directory.
    Sqlite,
}

/// Tidings: per-user notifications with live Server-Sent Events delivery.
#[derive(Parser, Debug, Clone)]
#[command(name = "tidings")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "TIDINGS_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "TIDINGS_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Data directory for the SQLite database
    #[arg(short, long, env = "TIDINGS_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Storage backend for notification history
    #[arg(long, env = "TIDINGS_STORAGE", value_enum, default_value_t = StorageBackend::Memory)]
    pub storage: StorageBackend,

    /// Maximum notifications kept and returned per user
    #[arg(long, env = "TIDINGS_MAX_PER_USER", default_value_t = 100)]
    pub max_per_user: usize,

    /// Undelivered notifications buffered per store subscription
    #[arg(long, env = "TIDINGS_QUEUE_CAPACITY", default_value_t = 16)]
    pub queue_capacity: usize,

    /// Undelivered notifications buffered per streaming connection
    #[arg(long, env = "TIDINGS_CONNECTION_QUEUE_CAPACITY", default_value_t = 32)]
    pub connection_queue_capacity: usize,

    /// Seconds between heartbeat events on a streaming connection
    #[arg(long, env = "TIDINGS_HEARTBEAT_SECS", default_value_t = 30)]
    pub heartbeat_secs: u64,

    /// Size of the SQLite connection pool
    #[arg(long, env = "TIDINGS_READER_POOL_SIZE", default_value_t = 10)]
    pub reader_pool_size: u32,

    /// Trusted request header carrying the authenticated user ID
    #[arg(long, env = "TIDINGS_IDENTITY_HEADER", default_value = "x-user-id")]
    pub identity_header: String,

    /// OpenTelemetry collector endpoint for metrics export (optional)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Store settings derived from this configuration.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_per_user: self.max_per_user,
            queue_capacity: self.queue_capacity,
        }
    }

    /// Broadcaster settings derived from this configuration.
    pub fn broadcaster_config(&self) -> BroadcasterConfig {
        BroadcasterConfig {
            queue_capacity: self.connection_queue_capacity,
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs.max(1)),
        }
    }

    /// Create a default configuration for testing.
    #[cfg(test)]
    pub fn test_config(data_dir: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0, // Random port
            data_dir,
            log_level: "debug".into(),
            storage: StorageBackend::Sqlite,
            max_per_user: 10,
            queue_capacity: 4,
            connection_queue_capacity: 8,
            heartbeat_secs: 1,
            reader_pool_size: 2,
            identity_header: "x-user-id".into(),
            otel_endpoint: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            log_level: "info".into(),
            storage: StorageBackend::Memory,
            max_per_user: 100,
            queue_capacity: 16,
            connection_queue_capacity: 32,
            heartbeat_secs: 30,
            reader_pool_size: 10,
            identity_header: "x-user-id".into(),
            otel_endpoint: None,
        }
    }
}
