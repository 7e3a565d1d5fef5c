//! Stale markers for caches the application re-fetches over REST.

#[cfg(test)]
#[path = "cache_test.rs"]
mod cache_test;

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

const INVALIDATION_CAPACITY: usize = 64;

/// Dependent query caches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Badges,
    Notifications,
}

impl CacheKey {
    pub const ALL: [Self; 2] = [Self::Badges, Self::Notifications];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Badges => "badges",
            Self::Notifications => "notifications",
        }
    }
}

/// Tracks which caches are stale and announces each invalidation.
pub struct CacheInvalidator {
    stale: Mutex<HashSet<CacheKey>>,
    tx: broadcast::Sender<CacheKey>,
}

impl Default for CacheInvalidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheInvalidator {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(INVALIDATION_CAPACITY);
        Self { stale: Mutex::new(HashSet::new()), tx }
    }

    pub fn invalidate(&self, key: CacheKey) {
        self.stale.lock().unwrap_or_else(PoisonError::into_inner).insert(key);
        debug!(cache = key.as_str(), "cache: invalidated");
        // No receivers is fine: the stale flag is the durable signal.
        let _ = self.tx.send(key);
    }

    /// Record that `key` has just been re-fetched.
    pub fn mark_fresh(&self, key: CacheKey) {
        self.stale.lock().unwrap_or_else(PoisonError::into_inner).remove(&key);
    }

    #[must_use]
    pub fn is_stale(&self, key: CacheKey) -> bool {
        self.stale.lock().unwrap_or_else(PoisonError::into_inner).contains(&key)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheKey> {
        self.tx.subscribe()
    }
}
