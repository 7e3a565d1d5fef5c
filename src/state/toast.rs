//! Presentation trigger: transient toasts with auto-dismiss timers.
//!
//! DESIGN
//! ======
//! The badge toast is a single slot; a newer unlock replaces the current one
//! and aborts its timer. Push toasts stack, each with its own timer. Every
//! toast carries a unique id and a timer only clears the toast it was
//! scheduled for, so a stale timer can never dismiss a newer toast.
//!
//! The visible set is published on a watch channel for renderers.

#[cfg(test)]
#[path = "toast_test.rs"]
mod toast_test;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::ToastConfig;
use crate::net::types::{BadgeUnlockEvent, NotificationEvent};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnlockToast {
    pub id: u64,
    pub event: BadgeUnlockEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushToast {
    pub id: u64,
    pub event: NotificationEvent,
}

/// Everything currently on screen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToastView {
    pub unlock: Option<UnlockToast>,
    /// Oldest first.
    pub pushes: Vec<PushToast>,
}

#[derive(Default)]
struct Timers {
    unlock: Option<JoinHandle<()>>,
    pushes: HashMap<u64, JoinHandle<()>>,
}

pub struct Presenter {
    config: ToastConfig,
    view: Arc<watch::Sender<ToastView>>,
    timers: Mutex<Timers>,
    next_id: AtomicU64,
}

impl Presenter {
    #[must_use]
    pub fn new(config: ToastConfig) -> Self {
        let (view, _) = watch::channel(ToastView::default());
        Self { config, view: Arc::new(view), timers: Mutex::new(Timers::default()), next_id: AtomicU64::new(1) }
    }

    /// Show the badge toast, replacing any current one. Returns the toast id.
    pub fn show_unlock_toast(&self, event: BadgeUnlockEvent) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(toast_id = id, badge_code = %event.badge_code, "toast: unlock");

        // The slot and its timer change under one lock, so the visible toast
        // always owns the surviving timer.
        let mut timers = self.lock_timers();
        self.view.send_modify(|view| view.unlock = Some(UnlockToast { id, event }));

        let view = Arc::clone(&self.view);
        let ttl = self.config.unlock_ttl;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            view.send_if_modified(|v| {
                if v.unlock.as_ref().is_some_and(|current| current.id == id) {
                    v.unlock = None;
                    return true;
                }
                false
            });
        });
        if let Some(previous) = timers.unlock.replace(timer) {
            previous.abort();
        }
        id
    }

    /// Show a push toast alongside any already visible. Returns the toast id.
    pub fn show_push_toast(&self, event: NotificationEvent) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(toast_id = id, notification_id = event.id, "toast: push");

        let mut timers = self.lock_timers();
        self.view.send_modify(|view| view.pushes.push(PushToast { id, event }));

        let view = Arc::clone(&self.view);
        let ttl = self.config.push_ttl;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            view.send_if_modified(|v| remove_push(v, id));
        });
        timers.pushes.retain(|_, handle| !handle.is_finished());
        timers.pushes.insert(id, timer);
        id
    }

    /// Manual dismissal of the badge toast.
    pub fn dismiss_unlock(&self) {
        if let Some(timer) = self.lock_timers().unlock.take() {
            timer.abort();
        }
        self.view.send_if_modified(|v| v.unlock.take().is_some());
    }

    /// Manual dismissal of one push toast.
    pub fn dismiss_push(&self, id: u64) {
        if let Some(timer) = self.lock_timers().pushes.remove(&id) {
            timer.abort();
        }
        self.view.send_if_modified(|v| remove_push(v, id));
    }

    /// Drop every toast and pending timer.
    pub fn clear(&self) {
        self.abort_timers();
        self.view.send_if_modified(|v| {
            let changed = v.unlock.is_some() || !v.pushes.is_empty();
            *v = ToastView::default();
            changed
        });
    }

    #[must_use]
    pub fn view(&self) -> ToastView {
        self.view.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ToastView> {
        self.view.subscribe()
    }

    fn lock_timers(&self) -> std::sync::MutexGuard<'_, Timers> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn abort_timers(&self) {
        let mut timers = self.lock_timers();
        if let Some(timer) = timers.unlock.take() {
            timer.abort();
        }
        for (_, timer) in timers.pushes.drain() {
            timer.abort();
        }
    }
}

impl Drop for Presenter {
    fn drop(&mut self) {
        self.abort_timers();
    }
}

fn remove_push(view: &mut ToastView, id: u64) -> bool {
    let before = view.pushes.len();
    view.pushes.retain(|t| t.id != id);
    view.pushes.len() != before
}
