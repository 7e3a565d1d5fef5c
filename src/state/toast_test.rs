use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::net::types::NotificationKind;

fn unlock(code: &str) -> BadgeUnlockEvent {
    BadgeUnlockEvent {
        notification_id: 1,
        badge_id: 10,
        badge_code: code.to_owned(),
        badge_name: code.to_lowercase(),
        badge_icon: "🏅".to_owned(),
        badge_grade: "BRONZE".to_owned(),
        badge_category: "MEETING".to_owned(),
        badge_description: String::new(),
        link_url: "/badges".to_owned(),
        sent_at: "2025-03-01T10:00:00".to_owned(),
        is_read: false,
    }
}

fn push(id: i64) -> NotificationEvent {
    NotificationEvent {
        id,
        kind: NotificationKind::Message,
        title: String::new(),
        content: format!("push {id}"),
        link_url: None,
        related_id: None,
        is_read: false,
        sent_at: None,
        sender: None,
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// =============================================================================
// BADGE SLOT
// =============================================================================

#[tokio::test(start_paused = true)]
async fn unlock_toast_auto_clears_after_ttl() {
    let presenter = Presenter::new(ToastConfig::default());
    presenter.show_unlock_toast(unlock("FIRST_MEETING"));
    assert_eq!(presenter.view().unlock.map(|t| t.event.badge_code).as_deref(), Some("FIRST_MEETING"));

    tokio::time::sleep(ms(4_900)).await;
    assert!(presenter.view().unlock.is_some());

    tokio::time::sleep(ms(200)).await;
    assert!(presenter.view().unlock.is_none());
}

#[tokio::test(start_paused = true)]
async fn newer_unlock_replaces_and_outlives_first_timer() {
    let presenter = Presenter::new(ToastConfig::default());
    presenter.show_unlock_toast(unlock("FIRST"));
    tokio::time::sleep(ms(3_000)).await;
    let second = presenter.show_unlock_toast(unlock("SECOND"));

    let view = presenter.view();
    assert_eq!(view.unlock.as_ref().map(|t| t.id), Some(second));
    assert_eq!(view.unlock.map(|t| t.event.badge_code).as_deref(), Some("SECOND"));

    // Past the first toast's deadline: the second must still be showing.
    tokio::time::sleep(ms(2_500)).await;
    assert_eq!(presenter.view().unlock.map(|t| t.id), Some(second));

    tokio::time::sleep(ms(2_600)).await;
    assert!(presenter.view().unlock.is_none());
}

#[tokio::test(start_paused = true)]
async fn dismiss_unlock_early_cancels_timer() {
    let presenter = Presenter::new(ToastConfig::default());
    presenter.show_unlock_toast(unlock("A"));
    presenter.dismiss_unlock();
    assert!(presenter.view().unlock.is_none());

    tokio::time::sleep(ms(1_000)).await;
    let id = presenter.show_unlock_toast(unlock("B"));
    tokio::time::sleep(ms(4_500)).await;
    assert_eq!(presenter.view().unlock.map(|t| t.id), Some(id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_unlocks_leave_the_visible_toast_with_a_live_timer() {
    for _ in 0..25 {
        let presenter = Arc::new(Presenter::new(ToastConfig { unlock_ttl: ms(20), push_ttl: ms(20) }));
        let callers = (0..8)
            .map(|n| {
                let presenter = Arc::clone(&presenter);
                tokio::spawn(async move { presenter.show_unlock_toast(unlock(&format!("B{n}"))) })
            })
            .collect::<Vec<_>>();
        for caller in callers {
            caller.await.unwrap();
        }

        let mut rx = presenter.subscribe();
        let cleared = tokio::time::timeout(ms(2_000), rx.wait_for(|v| v.unlock.is_none())).await;
        assert!(matches!(cleared, Ok(Ok(_))), "visible unlock toast was never dismissed");
    }
}

// =============================================================================
// PUSH STACK
// =============================================================================

#[tokio::test(start_paused = true)]
async fn push_toasts_stack_and_expire_independently() {
    let presenter = Presenter::new(ToastConfig::default());
    presenter.show_push_toast(push(1));
    tokio::time::sleep(ms(1_000)).await;
    presenter.show_push_toast(push(2));

    let shown = presenter.view().pushes.iter().map(|t| t.event.id).collect::<Vec<_>>();
    assert_eq!(shown, vec![1, 2]);

    tokio::time::sleep(ms(3_100)).await;
    let shown = presenter.view().pushes.iter().map(|t| t.event.id).collect::<Vec<_>>();
    assert_eq!(shown, vec![2]);

    tokio::time::sleep(ms(1_000)).await;
    assert!(presenter.view().pushes.is_empty());
}

#[tokio::test(start_paused = true)]
async fn push_toasts_do_not_touch_badge_slot() {
    let presenter = Presenter::new(ToastConfig::default());
    presenter.show_unlock_toast(unlock("A"));
    presenter.show_push_toast(push(1));
    presenter.show_push_toast(push(2));

    let view = presenter.view();
    assert!(view.unlock.is_some());
    assert_eq!(view.pushes.len(), 2);

    tokio::time::sleep(ms(4_100)).await;
    let view = presenter.view();
    assert!(view.unlock.is_some());
    assert!(view.pushes.is_empty());
}

#[tokio::test(start_paused = true)]
async fn dismiss_push_removes_only_that_toast() {
    let presenter = Presenter::new(ToastConfig::default());
    let first = presenter.show_push_toast(push(1));
    presenter.show_push_toast(push(2));

    presenter.dismiss_push(first);
    let shown = presenter.view().pushes.iter().map(|t| t.event.id).collect::<Vec<_>>();
    assert_eq!(shown, vec![2]);
    presenter.dismiss_push(first);
    assert_eq!(presenter.view().pushes.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn clear_drops_everything() {
    let presenter = Presenter::new(ToastConfig::default());
    let mut rx = presenter.subscribe();
    presenter.show_unlock_toast(unlock("A"));
    presenter.show_push_toast(push(1));
    assert!(rx.has_changed().unwrap());

    presenter.clear();
    assert_eq!(*rx.borrow_and_update(), ToastView::default());

    tokio::time::sleep(ms(10_000)).await;
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test(start_paused = true)]
async fn custom_ttls_are_honored() {
    let presenter = Presenter::new(ToastConfig { unlock_ttl: ms(100), push_ttl: ms(50) });
    presenter.show_unlock_toast(unlock("A"));
    presenter.show_push_toast(push(1));

    tokio::time::sleep(ms(60)).await;
    let view = presenter.view();
    assert!(view.unlock.is_some());
    assert!(view.pushes.is_empty());

    tokio::time::sleep(ms(60)).await;
    assert!(presenter.view().unlock.is_none());
}
