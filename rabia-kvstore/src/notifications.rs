//! Change notification bus for KVStore events.
//!
//! Wraps every `KVChangeEvent` produced by `KVStateMachine` with a `ChangeType` and
//! timestamp, and fans it out to subscribers via a message-bus pattern, the same shape
//! used by the leader crate's notification bus.

use crate::operations::KVChangeEvent;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

/// Coarse classification of a `KVChangeEvent`, used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
    /// A `Get` was applied; included so observers see reads that flowed through the log.
    Read,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeType::Created => write!(f, "CREATED"),
            ChangeType::Updated => write!(f, "UPDATED"),
            ChangeType::Deleted => write!(f, "DELETED"),
            ChangeType::Read => write!(f, "READ"),
        }
    }
}

/// A single change notification: the event plus its classification and arrival time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub event: KVChangeEvent,
    pub change_type: ChangeType,
    pub timestamp: u64,
}

impl ChangeNotification {
    /// Tests the wrapped event's key against a structured pattern.
    pub fn matches(&self, pattern: &rabia_core::StructuredPattern) -> bool {
        self.event.matches(pattern)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Filter applied when dispatching a `ChangeNotification` to a subscriber.
#[derive(Debug, Clone)]
pub enum NotificationFilter {
    All,
    Key(rabia_core::StructuredKey),
    Pattern(rabia_core::StructuredPattern),
    ChangeType(ChangeType),
    And(Vec<NotificationFilter>),
    Or(Vec<NotificationFilter>),
}

impl NotificationFilter {
    pub fn matches(&self, notification: &ChangeNotification) -> bool {
        match self {
            NotificationFilter::All => true,
            NotificationFilter::Key(key) => notification.event.key() == key,
            NotificationFilter::Pattern(pattern) => notification.matches(pattern),
            NotificationFilter::ChangeType(change_type) => {
                notification.change_type == *change_type
            }
            NotificationFilter::And(filters) => filters.iter().all(|f| f.matches(notification)),
            NotificationFilter::Or(filters) => filters.iter().any(|f| f.matches(notification)),
        }
    }
}

pub struct Subscription {
    pub id: SubscriptionId,
    pub filter: NotificationFilter,
    pub receiver: mpsc::UnboundedReceiver<ChangeNotification>,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationStats {
    pub total_notifications_sent: u64,
    pub total_subscribers: usize,
    pub dropped_notifications: u64,
}

/// Message bus for distributing `ChangeNotification`s.
pub struct KVNotificationBus {
    broadcast_tx: broadcast::Sender<ChangeNotification>,
    #[allow(clippy::type_complexity)]
    subscribers: Arc<
        RwLock<HashMap<SubscriptionId, (NotificationFilter, mpsc::UnboundedSender<ChangeNotification>)>>,
    >,
    stats: Arc<RwLock<NotificationStats>>,
}

impl KVNotificationBus {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1000);
        Self {
            broadcast_tx,
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(NotificationStats::default())),
        }
    }

    pub fn subscribe(&self, filter: NotificationFilter) -> Subscription {
        let id = SubscriptionId::new();
        let (tx, rx) = mpsc::unbounded_channel();

        self.subscribers.write().insert(id, (filter.clone(), tx));
        self.stats.write().total_subscribers += 1;

        debug!(?id, ?filter, "new kv notification subscription");
        Subscription {
            id,
            filter,
            receiver: rx,
        }
    }

    pub fn subscribe_all(&self) -> Subscription {
        self.subscribe(NotificationFilter::All)
    }

    pub fn subscribe_pattern(&self, pattern: rabia_core::StructuredPattern) -> Subscription {
        self.subscribe(NotificationFilter::Pattern(pattern))
    }

    pub fn unsubscribe(&self, subscription_id: SubscriptionId) {
        if self.subscribers.write().remove(&subscription_id).is_some() {
            let mut stats = self.stats.write();
            stats.total_subscribers = stats.total_subscribers.saturating_sub(1);
        }
    }

    /// Wraps `event` into a `ChangeNotification` and publishes it to every subscriber
    /// whose filter matches.
    pub async fn publish_change(&self, event: KVChangeEvent) {
        let change_type = event.change_type();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let notification = ChangeNotification {
            event,
            change_type,
            timestamp,
        };
        self.publish(notification).await;
    }

    pub async fn publish(&self, notification: ChangeNotification) {
        self.stats.write().total_notifications_sent += 1;

        let _ = self.broadcast_tx.send(notification.clone());

        let subscribers = self.subscribers.read();
        let mut dropped = 0u64;
        for (filter, sender) in subscribers.values() {
            if filter.matches(&notification) && sender.send(notification.clone()).is_err() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            self.stats.write().dropped_notifications += dropped;
        }
    }

    pub fn broadcast_receiver(&self) -> broadcast::Receiver<ChangeNotification> {
        self.broadcast_tx.subscribe()
    }

    pub fn get_stats(&self) -> NotificationStats {
        let stats = self.stats.read();
        let subscribers = self.subscribers.read();
        NotificationStats {
            total_notifications_sent: stats.total_notifications_sent,
            total_subscribers: subscribers.len(),
            dropped_notifications: stats.dropped_notifications,
        }
    }

    pub fn cleanup_closed_subscribers(&self) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|_, (_, sender)| !sender.is_closed());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for KVNotificationBus {
    fn default() -> Self {
        Self::new()
    }
}
