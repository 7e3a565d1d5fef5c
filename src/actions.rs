//! REST-driven reconciliation: user actions that must reach the server before
//! they change local state.
//!
//! ERROR HANDLING
//! ==============
//! The server call always runs first. On failure the local collection is left
//! untouched and the [`ApiError`] is returned so the caller can show an inline
//! error or retry. The live connection is never involved.

#[cfg(test)]
#[path = "actions_test.rs"]
mod actions_test;

use std::sync::Arc;

use tracing::{info, warn};

use crate::identity::Identity;
use crate::net::api::{ApiError, BadgeBackend, NotificationBackend};
use crate::net::types::{NotificationEvent, UserBadge};
use crate::state::NotifyState;
use crate::state::cache::CacheKey;

pub struct NotificationActions<B> {
    backend: B,
    state: Arc<NotifyState>,
    identity: Identity,
}

impl<B: NotificationBackend> NotificationActions<B> {
    pub fn new(backend: B, state: Arc<NotifyState>, identity: Identity) -> Self {
        Self { backend, state, identity }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Fetch the full list and make it the canonical collection.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the collection is unchanged.
    pub async fn refresh(&self) -> Result<usize, ApiError> {
        let list = self.backend.fetch_all_notifications(self.identity.user_id).await?;
        let events = list.notifications.into_iter().map(NotificationEvent::from).collect::<Vec<_>>();
        let count = self.state.replace_all(events).await;
        info!(user_id = self.identity.user_id, count, "actions: notifications refreshed");
        Ok(count)
    }

    /// # Errors
    ///
    /// Returns the backend error; the entry keeps its read flag.
    pub async fn mark_read(&self, id: i64) -> Result<(), ApiError> {
        self.backend
            .mark_as_read(id)
            .await
            .inspect_err(|e| warn!(notification_id = id, error = %e, "actions: mark read failed"))?;
        self.state.mark_read(id).await;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the backend error; no entry changes.
    pub async fn mark_all_read(&self) -> Result<u64, ApiError> {
        let flipped = self
            .backend
            .mark_all_read(self.identity.user_id)
            .await
            .inspect_err(|e| warn!(error = %e, "actions: mark all read failed"))?;
        self.state.mark_all_read().await;
        Ok(flipped)
    }

    /// # Errors
    ///
    /// Returns the backend error; the entry stays.
    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.backend
            .delete_notification(id)
            .await
            .inspect_err(|e| warn!(notification_id = id, error = %e, "actions: delete failed"))?;
        self.state.remove(id).await;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the backend error; the collection stays.
    pub async fn delete_all(&self) -> Result<(), ApiError> {
        self.backend
            .delete_all(self.identity.user_id)
            .await
            .inspect_err(|e| warn!(error = %e, "actions: delete all failed"))?;
        self.state.clear().await;
        Ok(())
    }

    /// Server-side unread count. Informational; also checked against the
    /// derived count so drift schedules a re-fetch.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn server_unread_count(&self) -> Result<u64, ApiError> {
        let count = self.backend.fetch_unread_count(self.identity.user_id).await?;
        self.state.reconcile_unread_count(count).await;
        Ok(count)
    }
}

pub struct BadgeActions<B> {
    backend: B,
    state: Arc<NotifyState>,
    identity: Identity,
}

impl<B: BadgeBackend> BadgeActions<B> {
    pub fn new(backend: B, state: Arc<NotifyState>, identity: Identity) -> Self {
        Self { backend, state, identity }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// All badges, earned or not. Clears the badge stale flag.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn list(&self) -> Result<Vec<UserBadge>, ApiError> {
        let badges = self.backend.fetch_badges(self.identity.user_id).await?;
        self.state.caches().mark_fresh(CacheKey::Badges);
        Ok(badges)
    }

    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn unlocked(&self) -> Result<Vec<UserBadge>, ApiError> {
        self.backend.fetch_unlocked_badges(self.identity.user_id).await
    }

    /// Ask the server to recompute every badge, then mark the badge cache stale
    /// so the next [`Self::list`] re-fetches.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn refresh_progress(&self) -> Result<(), ApiError> {
        self.backend.update_all_badge_progress(self.identity.user_id).await?;
        self.state.caches().invalidate(CacheKey::Badges);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn refresh_one(&self, badge_code: &str) -> Result<(), ApiError> {
        self.backend.update_badge_progress(self.identity.user_id, badge_code).await?;
        self.state.caches().invalidate(CacheKey::Badges);
        Ok(())
    }
}
