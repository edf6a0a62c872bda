//! Tidings: a per-user notification store with live Server-Sent Events delivery.
//!
//! Producers record notifications for a user; every viewer that user has
//! connected receives them immediately over a streaming HTTP connection.
//! Delivery is best-effort: a slow viewer misses notifications rather than
//! slowing the producer down.
//!
//! # Architecture
//!
//! - **Pluggable persistence**: history lives behind the [`storage::Repository`]
//!   trait, ephemeral in memory or durable in SQLite
//! - **Shared fanout**: one [`flow::fanout::SubscriberRegistry`] serves every
//!   store variant and the broadcaster
//! - **Non-blocking delivery**: bounded queues, enqueue-or-drop
//! - **Observable**: tracing spans and OpenTelemetry metrics
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration
//! - [`flow`]: Subscription registry and fanout
//! - [`notification`]: The notification entity
//! - [`observability`]: Metrics and tracing setup
//! - [`server`]: HTTP server setup
//! - [`service`]: HTTP handlers, broadcaster and event stream
//! - [`storage`]: Repository contract and its implementations
//! - [`store`]: The notification store

#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // store::StoreConfig is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::needless_raw_string_hashes  // r#""# is fine for SQL
)]

pub mod config;
pub mod flow;
pub mod notification;
pub mod observability;
pub mod server;
pub mod service;
pub mod storage;
pub mod store;

pub use notification::{Level, Notification};
pub use store::{NotificationStore, StoreConfig};

use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable) notification ID.
///
/// UUIDv7 stays unique across concurrent producers while still sorting
/// roughly by creation time.
///
/// # Example
///
/// ```
/// let id = tidings::generate_notification_id();
/// assert!(id.len() == 36); // UUID string format
/// ```
#[must_use]
pub fn generate_notification_id() -> String {
    Uuid::now_v7().to_string()
}

/// Get the current Unix timestamp in milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}
