//! Client-held state fed by the realtime channel and REST reconciliation.
//!
//! DESIGN
//! ======
//! `NotifyState` is constructed per session and injected where needed; there
//! is no global instance. It is the only writer of the notification
//! collection. Everything else gets snapshots or derived values, and the
//! REST-driven paths in `actions` go through the same reconciler methods as
//! pushed events.

pub mod cache;
pub mod notifications;
pub mod toast;


use tokio::sync::RwLock;
use tracing::{debug, info};

use self::cache::{CacheInvalidator, CacheKey};
use self::notifications::NotificationStore;
use self::toast::Presenter;
use crate::config::ToastConfig;
use crate::net::connection::EventHandler;
use crate::net::decode::InboundEvent;
use crate::net::subscription::TopicKind;
use crate::net::types::{BadgeUnlockEvent, NotificationEvent};

pub struct NotifyState {
    notifications: RwLock<NotificationStore>,
    presenter: Presenter,
    caches: CacheInvalidator,
}

impl NotifyState {
    #[must_use]
    pub fn new(toasts: ToastConfig) -> Self {
        Self {
            notifications: RwLock::new(NotificationStore::new()),
            presenter: Presenter::new(toasts),
            caches: CacheInvalidator::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Reconciler
    // -------------------------------------------------------------------------

    /// Prepend a pushed notification and raise a push toast, unless the id is
    /// already present.
    pub async fn ingest_push(&self, event: NotificationEvent) -> bool {
        let inserted = self.notifications.write().await.ingest_push(event.clone());
        if inserted {
            self.presenter.show_push_toast(event);
        } else {
            debug!(notification_id = event.id, "state: duplicate push ignored");
        }
        inserted
    }

    /// Badge unlocks are never stored: toast, then mark dependent caches stale.
    pub fn ingest_unlock(&self, event: BadgeUnlockEvent) {
        info!(badge_code = %event.badge_code, "state: badge unlocked");
        self.presenter.show_unlock_toast(event);
        self.caches.invalidate(CacheKey::Badges);
        self.caches.invalidate(CacheKey::Notifications);
    }

    pub async fn mark_read(&self, id: i64) -> bool {
        self.notifications.write().await.mark_read(id)
    }

    pub async fn mark_all_read(&self) -> usize {
        self.notifications.write().await.mark_all_read()
    }

    pub async fn remove(&self, id: i64) -> bool {
        self.notifications.write().await.remove(id).is_some()
    }

    pub async fn clear(&self) {
        self.notifications.write().await.clear();
    }

    /// Replace the collection with a REST fetch and mark it fresh. Returns the
    /// number of entries kept after duplicate ids are dropped.
    pub async fn replace_all(&self, events: Vec<NotificationEvent>) -> usize {
        let stored = self.notifications.write().await.replace_all(events);
        self.caches.mark_fresh(CacheKey::Notifications);
        stored
    }

    /// Compare a server-reported unread count with the derived one. A mismatch
    /// marks the notification cache stale; the local count is never overwritten.
    pub async fn reconcile_unread_count(&self, server_count: u64) -> bool {
        let local = self.unread_count().await;
        let matches = u64::try_from(local).is_ok_and(|local| local == server_count);
        if !matches {
            debug!(local, server_count, "state: unread count drift");
            self.caches.invalidate(CacheKey::Notifications);
        }
        matches
    }

    /// Forget everything for an identity switch or logout.
    pub async fn reset(&self) {
        self.notifications.write().await.clear();
        self.presenter.clear();
        for key in CacheKey::ALL {
            self.caches.invalidate(key);
        }
    }

    // -------------------------------------------------------------------------
    // Read views
    // -------------------------------------------------------------------------

    pub async fn unread_count(&self) -> usize {
        self.notifications.read().await.unread_count()
    }

    pub async fn notifications(&self) -> Vec<NotificationEvent> {
        self.notifications.read().await.entries().to_vec()
    }

    pub async fn notification(&self, id: i64) -> Option<NotificationEvent> {
        self.notifications.read().await.get(id).cloned()
    }

    #[must_use]
    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    #[must_use]
    pub fn caches(&self) -> &CacheInvalidator {
        &self.caches
    }
}

#[async_trait::async_trait]
impl EventHandler for NotifyState {
    async fn on_event(&self, topic: TopicKind, event: InboundEvent) {
        match event {
            InboundEvent::Notification(n) => {
                self.ingest_push(n).await;
            }
            InboundEvent::BadgeUnlocked(b) => self.ingest_unlock(b),
            InboundEvent::NotificationRead { id } => {
                self.mark_read(id).await;
            }
            InboundEvent::AllRead => {
                self.mark_all_read().await;
            }
            InboundEvent::UnreadCount(count) => {
                self.reconcile_unread_count(count).await;
            }
        }
        debug!(topic = topic.as_str(), "state: event applied");
    }
}
