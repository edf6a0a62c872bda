//! Connection-oriented delivery for streaming transports.
//!
//! Each open stream is its own subscription in the shared registry, so one
//! user with three browser tabs holds three queues. A connection ends when
//! the client goes away (the stream is dropped) or when the broadcaster is
//! shut down.

use std::sync::Arc;
use std::time::Duration;

use futures::{future, stream, Stream, StreamExt};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

use super::stream::StreamEvent;
use crate::flow::fanout::{FanoutReport, SubscriberRegistry, Subscription};
use crate::notification::Notification;
use crate::now_millis;

/// Default queue capacity for one streaming connection.
pub const DEFAULT_CONNECTION_QUEUE_CAPACITY: usize = 32;

/// Default time between heartbeat events.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Broadcaster tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcasterConfig {
    /// Notifications buffered per connection before new ones are dropped.
    pub queue_capacity: usize,
    /// Idle connections receive a heartbeat this often.
    pub heartbeat_interval: Duration,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_CONNECTION_QUEUE_CAPACITY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

/// Per-connection fanout over the shared subscriber registry.
#[derive(Debug)]
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    config: BroadcasterConfig,
    shutdown: CancellationToken,
}

impl Broadcaster {
    /// Create a broadcaster over `registry`.
    ///
    /// Pass the store's registry so notifications recorded by the store
    /// reach streaming connections.
    pub fn new(registry: Arc<SubscriberRegistry>, config: BroadcasterConfig) -> Self {
        Self {
            registry,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> BroadcasterConfig {
        self.config
    }

    /// Register one connection's queue until `token` is cancelled.
    pub fn subscribe(&self, token: CancellationToken, user_id: &str) -> Subscription {
        self.registry
            .subscribe(token, user_id, self.config.queue_capacity)
    }

    /// Push to every connection of `user_id` without recording history.
    pub fn broadcast(&self, user_id: &str, mut notification: Notification) -> FanoutReport {
        notification.fill_defaults(user_id);
        self.registry.fanout(user_id, &notification)
    }

    /// Push to every connection of every user, e.g. a maintenance alert.
    pub fn broadcast_all(&self, mut notification: Notification) -> FanoutReport {
        notification.stamp();
        let report = self.registry.fanout_all(&notification);
        tracing::info!(
            notification_id = %notification.id,
            delivered = report.delivered,
            dropped = report.dropped,
            "System-wide notification broadcast"
        );
        report
    }

    pub fn connected_users(&self) -> usize {
        self.registry.connected_users()
    }

    pub fn connected_clients(&self) -> usize {
        self.registry.connected_clients()
    }

    /// End every open connection. New connections end immediately.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Open a connection for `user_id` and return its event stream.
    ///
    /// The stream starts with a `connected` event, then yields whichever of
    /// notification, heartbeat or cancellation is ready first. Dropping the
    /// stream deregisters the connection.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self, user_id: &str) -> impl Stream<Item = StreamEvent> + Send + 'static {
        let token = self.shutdown.child_token();
        let subscription = self.subscribe(token.clone(), user_id);
        tracing::info!(
            user_id,
            subscription = %subscription.id(),
            clients = self.connected_clients(),
            "Stream connected"
        );

        let period = self.config.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let connection = Connection {
            subscription,
            heartbeat,
            cancelled: token.clone(),
            _guard: token.drop_guard(),
        };
        let greeting = StreamEvent::Connected {
            user_id: user_id.to_string(),
        };

        stream::once(future::ready(greeting)).chain(stream::unfold(connection, Connection::next_event))
    }
}

/// State owned by one open stream.
struct Connection {
    subscription: Subscription,
    heartbeat: Interval,
    cancelled: CancellationToken,
    /// Cancels the connection token when the stream is dropped.
    _guard: DropGuard,
}

impl Connection {
    async fn next_event(mut self) -> Option<(StreamEvent, Self)> {
        let event = tokio::select! {
            () = self.cancelled.cancelled() => return None,
            received = self.subscription.recv() => StreamEvent::Notification(received?),
            _ = self.heartbeat.tick() => StreamEvent::Heartbeat { timestamp: now_millis() },
        };
        Some((event, self))
    }
}
