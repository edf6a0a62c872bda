//! The notification store.
//!
//! A [`NotificationStore`] composes a [`Repository`] (where history lives)
//! with the shared [`SubscriberRegistry`] (who is listening right now). The
//! ephemeral and persistent forms differ only in the repository they are
//! built with, so live delivery behaves identically for both.
//!
//! No operation here fails from the caller's point of view. Repository
//! errors are logged and counted; reads that fail come back empty.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::flow::fanout::{SubscriberRegistry, Subscription};
use crate::notification::Notification;
use crate::observability::metrics::{record_persistence_failure, record_sent};
use crate::storage::{MemoryRepository, Repository, RepositoryError};

/// Default number of notifications kept and returned per user.
pub const DEFAULT_MAX_PER_USER: usize = 100;

/// Default queue capacity for a store subscription.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Store tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Caps the history kept in memory and the size of every listing.
    pub max_per_user: usize,
    /// Notifications buffered per subscription before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_per_user: DEFAULT_MAX_PER_USER,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Per-user notification history with live fanout.
pub struct NotificationStore {
    repository: Arc<dyn Repository>,
    registry: Arc<SubscriberRegistry>,
    config: StoreConfig,
}

impl std::fmt::Debug for NotificationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationStore")
            .field("backend", &self.repository.backend_name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NotificationStore {
    /// Ephemeral store: history lives in process memory only.
    pub fn in_memory(config: StoreConfig) -> Self {
        let repository = Arc::new(MemoryRepository::new(config.max_per_user));
        Self::persistent(repository, config)
    }

    /// Store writing through `repository`.
    pub fn persistent(repository: Arc<dyn Repository>, config: StoreConfig) -> Self {
        Self {
            repository,
            registry: Arc::new(SubscriberRegistry::new()),
            config,
        }
    }

    pub fn config(&self) -> StoreConfig {
        self.config
    }

    /// The live registry, shared with the broadcaster.
    pub fn registry(&self) -> Arc<SubscriberRegistry> {
        Arc::clone(&self.registry)
    }

    /// Record `notification` for `user_id` and push it to live subscribers.
    ///
    /// Fills in the id, timestamp and owner if unset. A persistence failure
    /// is logged and the notification is still delivered live. Returns the
    /// notification as recorded.
    #[tracing::instrument(skip(self, notification), fields(notification_id))]
    pub async fn send(&self, user_id: &str, mut notification: Notification) -> Notification {
        notification.fill_defaults(user_id);
        tracing::Span::current().record("notification_id", notification.id.as_str());

        if let Err(e) = self.repository.create(&notification).await {
            self.persistence_failed("create", &e);
        }
        record_sent(self.repository.backend_name());

        let report = self.registry.fanout(user_id, &notification);
        tracing::debug!(
            level = %notification.level,
            delivered = report.delivered,
            dropped = report.dropped,
            "Notification sent"
        );

        notification
    }

    /// All notifications for `user_id`, newest first.
    pub async fn get_all(&self, user_id: &str) -> Vec<Notification> {
        self.repository
            .get_all(user_id, self.config.max_per_user)
            .await
            .unwrap_or_else(|e| {
                self.persistence_failed("get_all", &e);
                Vec::new()
            })
    }

    /// Unread notifications for `user_id`, newest first.
    pub async fn get_unread(&self, user_id: &str) -> Vec<Notification> {
        self.repository
            .get_unread(user_id, self.config.max_per_user)
            .await
            .unwrap_or_else(|e| {
                self.persistence_failed("get_unread", &e);
                Vec::new()
            })
    }

    /// Mark one notification read. Unknown ids are ignored.
    pub async fn mark_read(&self, user_id: &str, id: &str) {
        if let Err(e) = self.repository.mark_read(user_id, id).await {
            self.persistence_failed("mark_read", &e);
        }
    }

    /// Mark every notification of `user_id` read.
    pub async fn mark_all_read(&self, user_id: &str) {
        if let Err(e) = self.repository.mark_all_read(user_id).await {
            self.persistence_failed("mark_all_read", &e);
        }
    }

    pub async fn unread_count(&self, user_id: &str) -> usize {
        self.repository
            .unread_count(user_id)
            .await
            .unwrap_or_else(|e| {
                self.persistence_failed("unread_count", &e);
                0
            })
    }

    /// Register a live subscription for `user_id` until `token` is cancelled.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe(&self, token: CancellationToken, user_id: &str) -> Subscription {
        self.registry
            .subscribe(token, user_id, self.config.queue_capacity)
    }

    pub fn subscriber_count(&self, user_id: &str) -> usize {
        self.registry.subscriber_count(user_id)
    }

    fn persistence_failed(&self, operation: &'static str, error: &RepositoryError) {
        let backend = self.repository.backend_name();
        record_persistence_failure(backend, operation);
        tracing::warn!(backend, operation, error = %error, "Repository call failed");
    }
}
