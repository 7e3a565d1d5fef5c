use super::*;

#[test]
fn new_invalidator_has_nothing_stale() {
    let caches = CacheInvalidator::new();
    for key in CacheKey::ALL {
        assert!(!caches.is_stale(key));
    }
}

#[test]
fn invalidate_then_mark_fresh() {
    let caches = CacheInvalidator::new();
    caches.invalidate(CacheKey::Badges);
    assert!(caches.is_stale(CacheKey::Badges));
    assert!(!caches.is_stale(CacheKey::Notifications));

    caches.mark_fresh(CacheKey::Badges);
    assert!(!caches.is_stale(CacheKey::Badges));
}

#[test]
fn invalidate_without_subscribers_still_marks_stale() {
    let caches = CacheInvalidator::new();
    caches.invalidate(CacheKey::Notifications);
    caches.invalidate(CacheKey::Notifications);
    assert!(caches.is_stale(CacheKey::Notifications));
}

#[tokio::test]
async fn subscribers_see_each_invalidation_in_order() {
    let caches = CacheInvalidator::new();
    let mut rx = caches.subscribe();
    caches.invalidate(CacheKey::Badges);
    caches.invalidate(CacheKey::Notifications);

    assert_eq!(rx.recv().await.unwrap(), CacheKey::Badges);
    assert_eq!(rx.recv().await.unwrap(), CacheKey::Notifications);
}
