//! Channel/Subscription/Message fan-out (spec.md §4.5).
//!
//! Unicast per subscription rather than one shared broadcast channel like
//! `riptide-events`'s own bus: subscribers have
//! individual filter maps, so a subscription only ever sees messages it
//! matches, not a firehose it has to filter client-side. Every mutation
//! that touches more than one index (subscriptions, by-user, by-channel)
//! happens under a single lock so the three stay consistent with each
//! other, per spec.md §5.

use autoqa_config::SubscriptionBusConfig;
use autoqa_types::{Channel, Clock, Message, Permission, Subscription};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

const DELIVERY_BUFFER: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubscribeError {
    #[error("channel not found")]
    ChannelNotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("user subscription limit exceeded")]
    UserLimitExceeded,
    #[error("channel subscription limit exceeded")]
    ChannelLimitExceeded,
}

struct Entry {
    subscription: Subscription,
    sender: mpsc::Sender<Message>,
}

struct State {
    channels: HashMap<Uuid, Channel>,
    subscriptions: HashMap<Uuid, Entry>,
    by_user: HashMap<String, HashSet<Uuid>>,
    by_channel: HashMap<Uuid, HashSet<Uuid>>,
}

impl State {
    fn new() -> Self {
        Self {
            channels: HashMap::new(),
            subscriptions: HashMap::new(),
            by_user: HashMap::new(),
            by_channel: HashMap::new(),
        }
    }

    fn remove_subscription(&mut self, subscription_id: Uuid) -> Option<Entry> {
        let entry = self.subscriptions.remove(&subscription_id)?;
        if let Some(set) = self.by_user.get_mut(&entry.subscription.user_id) {
            set.remove(&subscription_id);
        }
        if let Some(set) = self.by_channel.get_mut(&entry.subscription.channel_id) {
            set.remove(&subscription_id);
        }
        Some(entry)
    }
}

pub struct SubscriptionBus {
    state: Mutex<State>,
    config: SubscriptionBusConfig,
    clock: std::sync::Arc<dyn Clock>,
}

impl SubscriptionBus {
    pub fn new(config: SubscriptionBusConfig, clock: std::sync::Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::new()),
            config,
            clock,
        }
    }

    pub fn register_channel(&self, channel: Channel) {
        let mut state = self.state.lock().expect("bus mutex poisoned");
        state.channels.insert(channel.id, channel);
    }

    /// Returns the new subscription and the receiving end of its delivery
    /// channel. The caller (typically a WebSocket session) owns the
    /// receiver and drains it for as long as the connection is alive.
    pub fn subscribe(
        &self,
        user_id: impl Into<String>,
        channel_id: Uuid,
        requested: HashSet<Permission>,
        filters: HashMap<String, serde_json::Value>,
    ) -> Result<(Subscription, mpsc::Receiver<Message>), SubscribeError> {
        let user_id = user_id.into();
        let mut state = self.state.lock().expect("bus mutex poisoned");

        let channel = state
            .channels
            .get(&channel_id)
            .ok_or(SubscribeError::ChannelNotFound)?;
        let granted_by_channel = channel.granted_permissions(&user_id);
        if !requested.is_subset(&granted_by_channel) {
            return Err(SubscribeError::PermissionDenied);
        }

        let user_count = state.by_user.get(&user_id).map(|s| s.len()).unwrap_or(0);
        if user_count >= self.config.max_subscriptions_per_user {
            return Err(SubscribeError::UserLimitExceeded);
        }
        let channel_count = state
            .by_channel
            .get(&channel_id)
            .map(|s| s.len())
            .unwrap_or(0);
        if channel_count >= self.config.max_subscriptions_per_channel {
            return Err(SubscribeError::ChannelLimitExceeded);
        }

        let now = self.clock.now();
        let subscription = Subscription {
            id: Uuid::new_v4(),
            user_id: user_id.clone(),
            channel_id,
            granted: requested,
            filters,
            created_at: now,
            last_activity: now,
        };
        let (tx, rx) = mpsc::channel(DELIVERY_BUFFER);

        state.subscriptions.insert(
            subscription.id,
            Entry {
                subscription: subscription.clone(),
                sender: tx,
            },
        );
        state
            .by_user
            .entry(user_id)
            .or_default()
            .insert(subscription.id);
        state
            .by_channel
            .entry(channel_id)
            .or_default()
            .insert(subscription.id);

        Ok((subscription, rx))
    }

    /// Removes a subscription from every index. After this returns, no
    /// future `publish` can deliver to it (spec.md §4.5).
    pub fn unsubscribe(&self, subscription_id: Uuid) -> bool {
        let mut state = self.state.lock().expect("bus mutex poisoned");
        state.remove_subscription(subscription_id).is_some()
    }

    pub fn touch(&self, subscription_id: Uuid) {
        let now = self.clock.now();
        let mut state = self.state.lock().expect("bus mutex poisoned");
        if let Some(entry) = state.subscriptions.get_mut(&subscription_id) {
            entry.subscription.last_activity = now;
        }
    }

    /// Delivers `message` to every matching subscriber of its channel.
    /// Returns the number of subscriptions the message was handed to (a
    /// full delivery buffer is logged and skipped, never blocks the
    /// publisher).
    pub fn publish(&self, message: Message) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock().expect("bus mutex poisoned");
        let subscriber_ids: Vec<Uuid> = state
            .by_channel
            .get(&message.channel_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        let mut delivered = 0;
        for subscription_id in subscriber_ids {
            let Some(entry) = state.subscriptions.get_mut(&subscription_id) else {
                continue;
            };
            if !message.matches(&entry.subscription.granted, &entry.subscription.filters) {
                continue;
            }
            match entry.sender.try_send(message.clone()) {
                Ok(()) => {
                    entry.subscription.last_activity = now;
                    delivered += 1;
                }
                Err(err) => {
                    warn!(%subscription_id, error = %err, "dropping message, subscriber buffer full or closed");
                }
            }
        }
        delivered
    }

    /// Removes subscriptions idle longer than `subscription_timeout`.
    /// Exposed directly so tests can call it without waiting on a spawned
    /// interval.
    pub fn sweep_once(&self) -> Vec<Uuid> {
        let now = self.clock.now();
        let timeout = self.config.subscription_timeout;
        let mut state = self.state.lock().expect("bus mutex poisoned");
        let stale: Vec<Uuid> = state
            .subscriptions
            .values()
            .filter(|entry| {
                now.signed_duration_since(entry.subscription.last_activity)
                    .to_std()
                    .map(|idle| idle > timeout)
                    .unwrap_or(false)
            })
            .map(|entry| entry.subscription.id)
            .collect();
        for id in &stale {
            state.remove_subscription(*id);
        }
        if !stale.is_empty() {
            debug!(count = stale.len(), "swept idle subscriptions");
        }
        stale
    }

    pub fn subscription_count(&self) -> usize {
        self.state.lock().expect("bus mutex poisoned").subscriptions.len()
    }
}

/// Spawns the background sweeper. Aborting the returned handle stops it;
/// dropping the bus does not, so callers own the handle's lifecycle the
/// same way the FlowController and ContainerManager service loops do.
pub fn spawn_sweeper(bus: std::sync::Arc<SubscriptionBus>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            bus.sweep_once();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoqa_types::{ChannelKind, ManualClock};
    use chrono::Utc;

    fn config() -> SubscriptionBusConfig {
        SubscriptionBusConfig {
            max_subscriptions_per_user: 2,
            max_subscriptions_per_channel: 2,
            subscription_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(10),
        }
    }

    #[test]
    fn subscribe_fails_without_granted_permission() {
        let clock = ManualClock::new(Utc::now());
        let bus = SubscriptionBus::new(config(), clock);
        let channel = Channel::new(Uuid::new_v4(), "private", ChannelKind::Private);
        let channel_id = channel.id;
        bus.register_channel(channel);

        let mut requested = HashSet::new();
        requested.insert(Permission::Write);
        let err = bus
            .subscribe("alice", channel_id, requested, HashMap::new())
            .unwrap_err();
        assert_eq!(err, SubscribeError::PermissionDenied);
    }

    #[test]
    fn public_channel_allows_read_subscription() {
        let clock = ManualClock::new(Utc::now());
        let bus = SubscriptionBus::new(config(), clock);
        let channel = Channel::new(Uuid::new_v4(), "general", ChannelKind::Public);
        let channel_id = channel.id;
        bus.register_channel(channel);

        let mut requested = HashSet::new();
        requested.insert(Permission::Read);
        let (subscription, _rx) = bus
            .subscribe("alice", channel_id, requested, HashMap::new())
            .unwrap();
        assert_eq!(subscription.user_id, "alice");
        assert_eq!(bus.subscription_count(), 1);
    }

    #[test]
    fn per_channel_limit_is_enforced() {
        let clock = ManualClock::new(Utc::now());
        let bus = SubscriptionBus::new(config(), clock);
        let channel = Channel::new(Uuid::new_v4(), "general", ChannelKind::Public);
        let channel_id = channel.id;
        bus.register_channel(channel);

        let mut read = HashSet::new();
        read.insert(Permission::Read);
        bus.subscribe("alice", channel_id, read.clone(), HashMap::new())
            .unwrap();
        bus.subscribe("bob", channel_id, read.clone(), HashMap::new())
            .unwrap();
        let err = bus
            .subscribe("carol", channel_id, read, HashMap::new())
            .unwrap_err();
        assert_eq!(err, SubscribeError::ChannelLimitExceeded);
    }

    #[tokio::test]
    async fn publish_reaches_matching_subscription_only() {
        let clock = ManualClock::new(Utc::now());
        let bus = SubscriptionBus::new(config(), clock);
        let channel = Channel::new(Uuid::new_v4(), "general", ChannelKind::Public);
        let channel_id = channel.id;
        bus.register_channel(channel);

        let mut read = HashSet::new();
        read.insert(Permission::Read);
        let mut filters = HashMap::new();
        filters.insert("severity".to_string(), serde_json::json!("high"));
        let (_sub, mut rx) = bus
            .subscribe("alice", channel_id, read, filters)
            .unwrap();

        let mut content = HashMap::new();
        content.insert("severity".to_string(), serde_json::json!("low"));
        let low = Message {
            id: Uuid::new_v4(),
            channel_id,
            sender_id: "orchestrator".into(),
            kind: "execution-completed".into(),
            content,
            timestamp: Utc::now(),
            required_permissions: None,
        };
        assert_eq!(bus.publish(low), 0);

        let mut content = HashMap::new();
        content.insert("severity".to_string(), serde_json::json!("high"));
        let high = Message {
            id: Uuid::new_v4(),
            channel_id,
            sender_id: "orchestrator".into(),
            kind: "execution-completed".into(),
            content,
            timestamp: Utc::now(),
            required_permissions: None,
        };
        assert_eq!(bus.publish(high), 1);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn unsubscribe_prevents_future_delivery() {
        let clock = ManualClock::new(Utc::now());
        let bus = SubscriptionBus::new(config(), clock);
        let channel = Channel::new(Uuid::new_v4(), "general", ChannelKind::Public);
        let channel_id = channel.id;
        bus.register_channel(channel);

        let mut read = HashSet::new();
        read.insert(Permission::Read);
        let (subscription, _rx) = bus
            .subscribe("alice", channel_id, read, HashMap::new())
            .unwrap();
        assert!(bus.unsubscribe(subscription.id));

        let message = Message {
            id: Uuid::new_v4(),
            channel_id,
            sender_id: "orchestrator".into(),
            kind: "ping".into(),
            content: HashMap::new(),
            timestamp: Utc::now(),
            required_permissions: None,
        };
        assert_eq!(bus.publish(message), 0);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn sweep_removes_idle_subscriptions() {
        let clock = ManualClock::new(Utc::now());
        let bus = SubscriptionBus::new(config(), clock.clone());
        let channel = Channel::new(Uuid::new_v4(), "general", ChannelKind::Public);
        let channel_id = channel.id;
        bus.register_channel(channel);

        let mut read = HashSet::new();
        read.insert(Permission::Read);
        bus.subscribe("alice", channel_id, read, HashMap::new())
            .unwrap();

        clock.advance(Duration::from_secs(61));
        let swept = bus.sweep_once();
        assert_eq!(swept.len(), 1);
        assert_eq!(bus.subscription_count(), 0);
    }
}
