//! Ephemeral notification history held in process memory.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};

use super::{Repository, RepositoryResult};
use crate::notification::Notification;

/// Per-user history, newest first, capped at `max_per_user`.
///
/// Entries beyond the cap are evicted, not archived.
#[derive(Debug)]
pub struct MemoryRepository {
    max_per_user: usize,
    histories: RwLock<HashMap<String, VecDeque<Notification>>>,
}

impl MemoryRepository {
    pub fn new(max_per_user: usize) -> Self {
        Self {
            max_per_user,
            histories: RwLock::new(HashMap::new()),
        }
    }

    fn collect<F>(&self, user_id: &str, limit: usize, keep: F) -> Vec<Notification>
    where
        F: Fn(&Notification) -> bool,
    {
        let histories = self.histories.read().unwrap_or_else(PoisonError::into_inner);
        histories
            .get(user_id)
            .map(|history| {
                history
                    .iter()
                    .filter(|n| keep(n))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create(&self, notification: &Notification) -> RepositoryResult<()> {
        let mut histories = self.histories.write().unwrap_or_else(PoisonError::into_inner);
        let history = histories.entry(notification.user_id.clone()).or_default();
        history.push_front(notification.clone());
        history.truncate(self.max_per_user);
        Ok(())
    }

    async fn get_all(&self, user_id: &str, limit: usize) -> RepositoryResult<Vec<Notification>> {
        Ok(self.collect(user_id, limit, |_| true))
    }

    async fn get_unread(
        &self,
        user_id: &str,
        limit: usize,
    ) -> RepositoryResult<Vec<Notification>> {
        Ok(self.collect(user_id, limit, |n| !n.read))
    }

    async fn mark_read(&self, user_id: &str, id: &str) -> RepositoryResult<()> {
        let mut histories = self.histories.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(n) = histories
            .get_mut(user_id)
            .and_then(|history| history.iter_mut().find(|n| n.id == id))
        {
            n.read = true;
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: &str) -> RepositoryResult<()> {
        let mut histories = self.histories.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(history) = histories.get_mut(user_id) {
            for n in history.iter_mut() {
                n.read = true;
            }
        }
        Ok(())
    }

    async fn unread_count(&self, user_id: &str) -> RepositoryResult<usize> {
        let histories = self.histories.read().unwrap_or_else(PoisonError::into_inner);
        Ok(histories
            .get(user_id)
            .map_or(0, |history| history.iter().filter(|n| !n.read).count()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
