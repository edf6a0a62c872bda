//! Tidings: per-user notifications with live Server-Sent Events delivery.
//!
//! # Usage
//!
//! ```bash
//! tidings --port 8080 --storage sqlite --data-dir ./data --log-level info
//! ```
//!
//! Environment variables can also be used:
//! - `TIDINGS_PORT`: Port to listen on
//! - `TIDINGS_STORAGE`: `memory` or `sqlite`
//! - `TIDINGS_DATA_DIR`: Data directory for SQLite
//! - `TIDINGS_IDENTITY_HEADER`: Header carrying the authenticated user
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::Context;
use tidings::config::Config;
use tidings::observability::metrics::init_metrics_with_endpoint;
use tidings::observability::tracing::init_tracing;
use tidings::server::run_server;
use tokio::sync::watch;

/// Print startup banner with version and configuration.
fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        r#"
  _   _     _ _
 | |_(_) __| (_)_ __   __ _ ___
 | __| |/ _` | | '_ \ / _` / __|
 | |_| | (_| | | | | | (_| \__ \
  \__|_|\__,_|_|_| |_|\__, |___/
                      |___/

  Tidings v{} - Live Notifications

  Configuration:
    Address:      {}:{}
    Storage:      {:?}
    Max/User:     {}
    Heartbeat:    {}s
    Log Level:    {}

  Press Ctrl+C to shutdown gracefully.
"#,
        version,
        config.host,
        config.port,
        config.storage,
        config.max_per_user,
        config.heartbeat_secs,
        config.log_level
    );
}

/// Resolve once SIGINT or SIGTERM arrives.
async fn wait_for_signal() -> anyhow::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

        tokio::select! {
            result = ctrl_c => {
                result.context("failed to listen for ctrl+c")?;
                tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.context("failed to listen for ctrl+c")?;
        tracing::info!("Received Ctrl+C, initiating shutdown...");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse_args();

    init_tracing(&config.log_level);
    init_metrics_with_endpoint(config.otel_endpoint.as_deref());

    print_banner(&config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            tracing::error!(error = %e, "Signal handling failed, shutting down");
        }
        let _ = shutdown_tx.send(true);
    });

    run_server(config, shutdown_rx)
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))?;

    tracing::info!("Tidings shutdown complete");
    Ok(())
}
