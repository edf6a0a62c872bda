//! Live subscription registry and non-blocking fanout.
//!
//! Every subscription owns a bounded queue. Fanout copies the relevant
//! senders while holding the read lock, releases it, and then `try_send`s
//! into each queue. A full queue means that subscriber misses the
//! notification; the producer never waits.
//!
//! Subscriptions are torn down by a watcher task bound to the caller's
//! [`CancellationToken`]. Removing the sender from the map closes the queue
//! once any in-flight fanout snapshot has been dropped.
//! A queue whose receiver was dropped without cancelling is pruned by the
//! next fanout that reaches it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::notification::Notification;
use crate::observability::metrics::{record_fanout, record_subscription_change};

/// Process-unique identity of one subscription queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Outcome of one fanout pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Queues that accepted the notification.
    pub delivered: usize,
    /// Queues that were full; those subscribers miss it.
    pub dropped: usize,
    /// Queues whose receiving half is already gone.
    pub closed: usize,
}

impl FanoutReport {
    fn merge(&mut self, other: Self) {
        self.delivered += other.delivered;
        self.dropped += other.dropped;
        self.closed += other.closed;
    }
}

type Senders = HashMap<SubscriptionId, mpsc::Sender<Notification>>;

/// Registry of live subscriptions, keyed by user.
///
/// Shared by the store and the broadcaster so a notification recorded by
/// either reaches every queue the user holds.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    users: RwLock<HashMap<String, Senders>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bounded queue for `user_id`.
    ///
    /// The subscription stays registered until `token` is cancelled; a
    /// watcher task then removes it exactly once. `capacity` is clamped to
    /// at least one slot.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe(
        self: &Arc<Self>,
        token: CancellationToken,
        user_id: &str,
        capacity: usize,
    ) -> Subscription {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id.to_string())
            .or_default()
            .insert(id, tx);
        record_subscription_change(1);

        tracing::debug!(user_id, subscription = %id, capacity, "Subscription registered");

        let registry = Arc::clone(self);
        let owner = user_id.to_string();
        tokio::spawn(async move {
            token.cancelled().await;
            registry.remove(&owner, id);
        });

        Subscription {
            id,
            user_id: user_id.to_string(),
            receiver: rx,
        }
    }

    /// Remove one subscription. Returns false if it was already gone.
    fn remove(&self, user_id: &str, id: SubscriptionId) -> bool {
        let removed = {
            let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
            let Some(senders) = users.get_mut(user_id) else {
                return false;
            };
            let removed = senders.remove(&id).is_some();
            if senders.is_empty() {
                users.remove(user_id);
            }
            removed
        };

        if removed {
            record_subscription_change(-1);
            tracing::debug!(user_id, subscription = %id, "Subscription closed");
        }
        removed
    }

    /// Offer `notification` to every queue registered for `user_id`.
    pub fn fanout(&self, user_id: &str, notification: &Notification) -> FanoutReport {
        let targets: Vec<_> = {
            let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
            users
                .get(user_id)
                .map(|senders| senders.iter().map(|(id, tx)| (*id, tx.clone())).collect())
                .unwrap_or_default()
        };

        let report = self.offer(user_id, &targets, notification);
        record_fanout(report.delivered, report.dropped);
        report
    }

    /// Offer `notification` to every queue of every user.
    pub fn fanout_all(&self, notification: &Notification) -> FanoutReport {
        let targets: Vec<(String, Vec<_>)> = {
            let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
            users
                .iter()
                .map(|(user_id, senders)| {
                    let senders = senders.iter().map(|(id, tx)| (*id, tx.clone())).collect();
                    (user_id.clone(), senders)
                })
                .collect()
        };

        let mut report = FanoutReport::default();
        for (user_id, senders) in &targets {
            report.merge(self.offer(user_id, senders, notification));
        }
        record_fanout(report.delivered, report.dropped);
        report
    }

    /// Number of users holding at least one subscription.
    pub fn connected_users(&self) -> usize {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total number of subscriptions across all users.
    pub fn connected_clients(&self) -> usize {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// Number of subscriptions held by `user_id`.
    pub fn subscriber_count(&self, user_id: &str) -> usize {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .map_or(0, HashMap::len)
    }

    /// Enqueue into each sender without waiting.
    ///
    /// Queues whose receiver is gone are pruned. Must be called without the
    /// registry lock held.
    fn offer(
        &self,
        user_id: &str,
        targets: &[(SubscriptionId, mpsc::Sender<Notification>)],
        notification: &Notification,
    ) -> FanoutReport {
        let mut report = FanoutReport::default();
        for (id, tx) in targets {
            match tx.try_send(notification.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    tracing::debug!(
                        user_id,
                        subscription = %id,
                        notification_id = %notification.id,
                        "Subscriber queue full, notification dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    report.closed += 1;
                    self.remove(user_id, *id);
                }
            }
        }
        report
    }
}

/// Receiving half of a subscription.
///
/// Yields notifications in the order they were fanned out to this queue.
/// Returns `None` once the subscription has been cancelled and drained.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    user_id: String,
    receiver: mpsc::Receiver<Notification>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Wait for the next notification.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }

    /// Take a buffered notification without waiting.
    pub fn try_recv(&mut self) -> Result<Notification, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Convert into a [`futures::Stream`] of notifications.
    pub fn into_stream(self) -> ReceiverStream<Notification> {
        ReceiverStream::new(self.receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_until_unsubscribed(registry: &SubscriberRegistry, user_id: &str) -> bool {
        for _ in 0..100 {
            if registry.subscriber_count(user_id) == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_fanout_reaches_every_subscription_of_user() {
        let registry = Arc::new(SubscriberRegistry::new());
        let token = CancellationToken::new();
        let mut a = registry.subscribe(token.clone(), "alice", 4);
        let mut b = registry.subscribe(token.clone(), "alice", 4);
        let mut other = registry.subscribe(token.clone(), "bob", 4);

        let report = registry.fanout("alice", &Notification::info("Hi", ""));
        assert_eq!(report.delivered, 2);

        assert_eq!(a.recv().await.unwrap().title, "Hi");
        assert_eq!(b.recv().await.unwrap().title, "Hi");
        assert!(matches!(other.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_fanout_without_subscribers() {
        let registry = SubscriberRegistry::new();

        // No subscribers - should not panic
        let report = registry.fanout("nobody", &Notification::info("Hi", ""));
        assert_eq!(report, FanoutReport::default());
    }

    #[tokio::test]
    async fn test_full_queue_drops_for_that_subscriber_only() {
        let registry = Arc::new(SubscriberRegistry::new());
        let token = CancellationToken::new();
        let mut saturated = registry.subscribe(token.clone(), "dave", 2);
        let mut spare = registry.subscribe(token.clone(), "dave", 8);

        for i in 0..2 {
            registry.fanout("dave", &Notification::info(format!("n{i}"), ""));
        }
        let report = registry.fanout("dave", &Notification::info("late", ""));
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);

        let mut saturated_titles = Vec::new();
        while let Ok(n) = saturated.try_recv() {
            saturated_titles.push(n.title);
        }
        assert_eq!(saturated_titles, vec!["n0", "n1"]);

        let mut spare_titles = Vec::new();
        while let Ok(n) = spare.try_recv() {
            spare_titles.push(n.title);
        }
        assert_eq!(spare_titles, vec!["n0", "n1", "late"]);
    }

    #[tokio::test]
    async fn test_cancel_removes_and_closes_queue() {
        let registry = Arc::new(SubscriberRegistry::new());
        let token = CancellationToken::new();
        let mut sub = registry.subscribe(token.clone(), "carol", 4);
        assert_eq!(registry.connected_clients(), 1);

        token.cancel();
        assert!(wait_until_unsubscribed(&registry, "carol").await);
        assert_eq!(registry.connected_users(), 0);

        // Queue is closed once the registry dropped its sender.
        assert!(sub.recv().await.is_none());

        // Later sends find nobody and return immediately.
        let report = registry.fanout("carol", &Notification::info("gone", ""));
        assert_eq!(report.delivered, 0);
    }

    #[tokio::test]
    async fn test_remove_runs_once() {
        let registry = Arc::new(SubscriberRegistry::new());
        let token = CancellationToken::new();
        let sub = registry.subscribe(token.clone(), "erin", 1);

        assert!(registry.remove("erin", sub.id()));
        assert!(!registry.remove("erin", sub.id()));

        // The watcher firing afterwards is harmless.
        token.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(registry.connected_clients(), 0);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_pruned_on_fanout() {
        let registry = Arc::new(SubscriberRegistry::new());
        let token = CancellationToken::new();
        drop(registry.subscribe(token.clone(), "frank", 1));

        assert_eq!(registry.subscriber_count("frank"), 1);

        let report = registry.fanout("frank", &Notification::info("Hi", ""));
        assert_eq!(report.closed, 1);
        assert_eq!(report.delivered, 0);
        assert_eq!(registry.subscriber_count("frank"), 0);
        assert_eq!(registry.connected_clients(), 0);

        // Cancelling later finds nothing left to remove.
        token.cancel();
        tokio::task::yield_now().await;
        assert_eq!(registry.connected_users(), 0);
    }

    #[tokio::test]
    async fn test_fanout_all_and_introspection() {
        let registry = Arc::new(SubscriberRegistry::new());
        let token = CancellationToken::new();
        let mut a1 = registry.subscribe(token.clone(), "a", 4);
        let mut a2 = registry.subscribe(token.clone(), "a", 4);
        let mut b = registry.subscribe(token.clone(), "b", 4);

        assert_eq!(registry.connected_users(), 2);
        assert_eq!(registry.connected_clients(), 3);
        assert_eq!(registry.subscriber_count("a"), 2);

        let report = registry.fanout_all(&Notification::danger("Maintenance", "in 5 min"));
        assert_eq!(report.delivered, 3);
        for sub in [&mut a1, &mut a2, &mut b] {
            assert_eq!(sub.try_recv().unwrap().title, "Maintenance");
        }
    }

    #[tokio::test]
    async fn test_zero_capacity_is_clamped() {
        let registry = Arc::new(SubscriberRegistry::new());
        let mut sub = registry.subscribe(CancellationToken::new(), "gina", 0);

        let report = registry.fanout("gina", &Notification::info("Hi", ""));
        assert_eq!(report.delivered, 1);
        assert!(sub.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_subscription_ids_are_unique() {
        let registry = Arc::new(SubscriberRegistry::new());
        let token = CancellationToken::new();
        let a = registry.subscribe(token.clone(), "hank", 1);
        let b = registry.subscribe(token.clone(), "hank", 1);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.user_id(), "hank");
    }

    #[tokio::test]
    async fn test_subscription_as_stream_ends_on_cancel() {
        use futures::StreamExt;

        let registry = Arc::new(SubscriberRegistry::new());
        let token = CancellationToken::new();
        let mut stream = registry.subscribe(token.clone(), "jane", 4).into_stream();

        registry.fanout("jane", &Notification::info("first", ""));
        registry.fanout("jane", &Notification::info("second", ""));
        token.cancel();

        let titles: Vec<_> = tokio::time::timeout(Duration::from_secs(2), async {
            let mut titles = Vec::new();
            while let Some(n) = stream.next().await {
                titles.push(n.title);
            }
            titles
        })
        .await
        .unwrap();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_fanout_wakes_pending_receiver() {
        let registry = Arc::new(SubscriberRegistry::new());
        let token = CancellationToken::new();
        let mut sub = registry.subscribe(token.clone(), "ivy", 2);

        let mut recv = tokio_test::task::spawn(sub.recv());
        tokio_test::assert_pending!(recv.poll());

        registry.fanout("ivy", &Notification::info("ping", ""));
        assert!(recv.is_woken());
        let received = tokio_test::assert_ready!(recv.poll());
        assert_eq!(received.unwrap().title, "ping");
    }
}
