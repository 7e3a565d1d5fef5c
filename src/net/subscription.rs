//! Per-user topic subscriptions on one STOMP connection.
//!
//! The registry never touches the transport. Every operation returns the
//! frames the connection manager must send, which keeps the
//! one-listener-per-topic rule checkable without a socket.

#[cfg(test)]
#[path = "subscription_test.rs"]
mod subscription_test;

use stomp::Frame;

use crate::identity::Identity;

/// The two per-user push streams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TopicKind {
    Notification,
    Badge,
}

impl TopicKind {
    pub const ALL: [Self; 2] = [Self::Notification, Self::Badge];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Notification => "notification",
            Self::Badge => "badge",
        }
    }

    /// Destination for `user_id`, e.g. `/topic/notification/42`.
    #[must_use]
    pub fn destination(self, user_id: i64) -> String {
        format!("/topic/{}/{user_id}", self.as_str())
    }
}

/// One live listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub topic: TopicKind,
    pub destination: String,
    pub user_id: i64,
}

/// Subscriptions of a single connection instance.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    next_id: u64,
    active: Vec<Subscription>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach both topics for `identity`.
    ///
    /// Any listener already bound to a topic is torn down first, so the
    /// returned frames may start with `UNSUBSCRIBE`s.
    pub fn subscribe(&mut self, identity: &Identity) -> Vec<Frame> {
        let mut frames = Vec::with_capacity(TopicKind::ALL.len() * 2);
        for topic in TopicKind::ALL {
            if let Some(pos) = self.active.iter().position(|s| s.topic == topic) {
                let stale = self.active.remove(pos);
                frames.push(Frame::unsubscribe(&stale.id));
            }
            let id = format!("sub-{}", self.next_id);
            self.next_id += 1;
            let destination = topic.destination(identity.user_id);
            frames.push(Frame::subscribe(&id, &destination));
            self.active.push(Subscription { id, topic, destination, user_id: identity.user_id });
        }
        frames
    }

    /// Detach every listener owned by `identity`.
    pub fn unsubscribe(&mut self, identity: &Identity) -> Vec<Frame> {
        let mut frames = Vec::new();
        self.active.retain(|s| {
            if s.user_id == identity.user_id {
                frames.push(Frame::unsubscribe(&s.id));
                false
            } else {
                true
            }
        });
        frames
    }

    /// Forget all listeners without emitting frames.
    ///
    /// Called when the transport is replaced: the broker has already dropped
    /// the old subscriptions along with the old socket.
    pub fn reset(&mut self) {
        self.active.clear();
        self.next_id = 0;
    }

    /// Topic bound to a `subscription` header value, if still live.
    #[must_use]
    pub fn route(&self, subscription_id: &str) -> Option<TopicKind> {
        self.active.iter().find(|s| s.id == subscription_id).map(|s| s.topic)
    }

    #[must_use]
    pub fn active(&self) -> &[Subscription] {
        &self.active
    }

    #[must_use]
    pub fn active_for(&self, topic: TopicKind) -> usize {
        self.active.iter().filter(|s| s.topic == topic).count()
    }
}
