//! Topic-addressed delivery bus.
//!
//! Topics are participant, candidate, or session ids. The bus is the only
//! way the engine reaches a participant: the connection currently
//! representing that participant subscribes to the participant's topic,
//! and whoever holds the id can publish without caring whether the
//! underlying connection is still alive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hallo_common::ServerMessage;
use tokio::sync::{mpsc, RwLock};

/// A message traveling over the bus.
#[derive(Debug, Clone)]
pub enum Envelope {
    /// Outbound delivery to the participant subscribed on this topic.
    Deliver(ServerMessage),
    /// A participant's vote on the candidate topic it was offered.
    Accept { from: String },
}

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<Envelope>,
}

/// Receiving half of one subscription. Unsubscribe explicitly via
/// [`Bus::unsubscribe`] when tearing down; a dropped receiver merely stops
/// consuming, publishers never see an error either way.
pub struct Subscription {
    topic: String,
    id: u64,
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Non-blocking poll, for tests and teardown drains.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Thread-safe publish/subscribe registry.
#[derive(Clone, Default)]
pub struct Bus {
    topics: Arc<RwLock<HashMap<String, Vec<Subscriber>>>>,
    next_id: Arc<AtomicU64>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber on `topic`.
    pub async fn subscribe(&self, topic: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber { id, tx });

        Subscription {
            topic: topic.to_string(),
            id,
            rx,
        }
    }

    /// Remove a subscription from its topic.
    pub async fn unsubscribe(&self, sub: Subscription) {
        let mut topics = self.topics.write().await;
        if let Some(subscribers) = topics.get_mut(&sub.topic) {
            subscribers.retain(|s| s.id != sub.id);
            if subscribers.is_empty() {
                topics.remove(&sub.topic);
            }
        }
    }

    /// Deliver `envelope` to every subscriber of `topic`, in subscription
    /// order. Returns how many subscribers were reached. Publishing to a
    /// topic nobody listens on is a no-op.
    pub async fn publish(&self, topic: &str, envelope: Envelope) -> usize {
        let topics = self.topics.read().await;
        let Some(subscribers) = topics.get(topic) else {
            return 0;
        };

        let mut reached = 0;
        for sub in subscribers {
            // A closed receiver means the subscriber went away mid-flight;
            // that is not the publisher's problem.
            if sub.tx.send(envelope.clone()).is_ok() {
                reached += 1;
            }
        }
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping() -> Envelope {
        Envelope::Deliver(ServerMessage::QueueSize { queue_size: 0 })
    }

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = Bus::new();
        let mut sub = bus.subscribe("alice").await;

        assert_eq!(bus.publish("alice", ping()).await, 1);
        assert!(matches!(sub.recv().await, Some(Envelope::Deliver(_))));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let bus = Bus::new();
        assert_eq!(bus.publish("nobody", ping()).await, 0);
    }

    #[tokio::test]
    async fn delivery_in_subscription_order() {
        let bus = Bus::new();
        let mut first = bus.subscribe("room").await;
        let mut second = bus.subscribe("room").await;

        bus.publish(
            "room",
            Envelope::Accept {
                from: "alice".into(),
            },
        )
        .await;

        // Both see the message; ordering across receivers is checked by
        // the reached count being the full subscriber list.
        assert!(matches!(first.recv().await, Some(Envelope::Accept { .. })));
        assert!(matches!(second.recv().await, Some(Envelope::Accept { .. })));
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = Bus::new();
        let sub = bus.subscribe("alice").await;
        bus.unsubscribe(sub).await;

        assert_eq!(bus.publish("alice", ping()).await, 0);
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_error_publisher() {
        let bus = Bus::new();
        let sub = bus.subscribe("alice").await;
        drop(sub);

        // Subscriber entry still registered, but its channel is closed.
        assert_eq!(bus.publish("alice", ping()).await, 0);
    }

    #[tokio::test]
    async fn topics_are_independent() {
        let bus = Bus::new();
        let mut alice = bus.subscribe("alice").await;
        let _bob = bus.subscribe("bob").await;

        bus.publish("alice", ping()).await;
        assert!(alice.recv().await.is_some());
        assert!(alice.try_recv().is_none());
    }
}
