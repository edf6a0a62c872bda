//! Persistence layer for notification history.
//!
//! Provides:
//! - The [`Repository`] contract the store writes through
//! - An ephemeral in-memory implementation capped per user
//! - A durable SQLite implementation on a pooled connection set

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

use async_trait::async_trait;
use thiserror::Error;

use crate::notification::Notification;

/// Error type for repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Durable persistence contract for notifications.
///
/// All listings are scoped to one user and return newest first, at most
/// `limit` entries. Cancellation follows future semantics: dropping a
/// pending call abandons it.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn create(&self, notification: &Notification) -> RepositoryResult<()>;
    async fn get_all(&self, user_id: &str, limit: usize) -> RepositoryResult<Vec<Notification>>;
    async fn get_unread(&self, user_id: &str, limit: usize)
        -> RepositoryResult<Vec<Notification>>;
    /// Marking an unknown id is not an error.
    async fn mark_read(&self, user_id: &str, id: &str) -> RepositoryResult<()>;
    async fn mark_all_read(&self, user_id: &str) -> RepositoryResult<()>;
    async fn unread_count(&self, user_id: &str) -> RepositoryResult<usize>;

    /// Short name used in logs and metric attributes.
    fn backend_name(&self) -> &'static str;
}
