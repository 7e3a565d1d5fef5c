//! Canonical notification collection.
//!
//! Entries are unique by id and kept in arrival/fetch order, newest push
//! first. The unread count is always derived from the entries.

#[cfg(test)]
#[path = "notifications_test.rs"]
mod notifications_test;

use std::collections::HashSet;

use crate::net::types::NotificationEvent;

#[derive(Clone, Debug, Default)]
pub struct NotificationStore {
    entries: Vec<NotificationEvent>,
}

impl NotificationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a pushed event. Returns `false` for a redelivered id.
    pub fn ingest_push(&mut self, event: NotificationEvent) -> bool {
        if self.contains(event.id) {
            return false;
        }
        self.entries.insert(0, event);
        true
    }

    /// Replace everything with a fetched list, keeping the first of any duplicate id.
    pub fn replace_all(&mut self, events: impl IntoIterator<Item = NotificationEvent>) -> usize {
        let mut seen = HashSet::new();
        self.entries = events.into_iter().filter(|e| seen.insert(e.id)).collect();
        self.entries.len()
    }

    /// Flip the read flag of `id`. Returns whether an unread entry changed;
    /// an unknown id is not an error.
    pub fn mark_read(&mut self, id: i64) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) if !entry.is_read => {
                entry.is_read = true;
                true
            }
            _ => false,
        }
    }

    /// Mark every entry read. Returns how many flipped.
    pub fn mark_all_read(&mut self) -> usize {
        let mut flipped = 0;
        for entry in self.entries.iter_mut().filter(|e| !e.is_read) {
            entry.is_read = true;
            flipped += 1;
        }
        flipped
    }

    pub fn remove(&mut self, id: i64) -> Option<NotificationEvent> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(pos))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_read).count()
    }

    #[must_use]
    pub fn contains(&self, id: i64) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<&NotificationEvent> {
        self.entries.iter().find(|e| e.id == id)
    }

    #[must_use]
    pub fn entries(&self) -> &[NotificationEvent] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
