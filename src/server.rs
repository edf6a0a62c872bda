//! HTTP server setup and lifecycle.
//!
//! Configures axum with:
//! - Notification endpoints and the event stream
//! - The configured storage backend
//! - Graceful shutdown that also closes open streams

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderName;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::config::{Config, StorageBackend};
use crate::service::{create_router, header_identity, AppState};
use crate::storage::{Repository, SqliteRepository};
use crate::store::NotificationStore;

/// Build the notification store for the configured backend.
pub fn build_store(config: &Config) -> Result<NotificationStore, Box<dyn std::error::Error>> {
    let store_config = config.store_config();
    let store = match config.storage {
        StorageBackend::Memory => NotificationStore::in_memory(store_config),
        StorageBackend::Sqlite => {
            std::fs::create_dir_all(&config.data_dir)?;
            let repository: Arc<dyn Repository> = Arc::new(SqliteRepository::open(
                config.data_dir.join("tidings.db"),
                config.reader_pool_size,
                store_config.max_per_user,
            )?);
            NotificationStore::persistent(repository, store_config)
        }
    };
    tracing::info!(store = ?store, "Notification store ready");
    Ok(store)
}

/// Run the Tidings HTTP server.
///
/// # Arguments
///
/// * `config` - Server configuration
/// * `shutdown_rx` - Receiver for shutdown signal
///
/// # Returns
///
/// Returns when the server has shut down.
pub async fn run_server(
    config: Config,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let store = Arc::new(build_store(&config)?);
    let identity = header_identity(HeaderName::try_from(config.identity_header.as_str())?);
    let state = AppState::new(store, config.broadcaster_config(), identity);
    let broadcaster = Arc::clone(&state.broadcaster);

    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, "Starting Tidings HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            tracing::info!(
                clients = broadcaster.connected_clients(),
                "Shutdown signal received, closing streams"
            );
            // Open streams never finish on their own.
            broadcaster.shutdown();
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
