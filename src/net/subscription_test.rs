use super::*;
use stomp::Command;

#[test]
fn topic_destinations_follow_user_id() {
    assert_eq!(TopicKind::Notification.destination(42), "/topic/notification/42");
    assert_eq!(TopicKind::Badge.destination(42), "/topic/badge/42");
}

#[test]
fn subscribe_emits_one_frame_per_topic() {
    let mut registry = SubscriptionRegistry::new();
    let frames = registry.subscribe(&Identity::new(42));

    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|f| f.command == Command::Subscribe));
    assert_eq!(frames[0].header("destination"), Some("/topic/notification/42"));
    assert_eq!(frames[0].header("id"), Some("sub-0"));
    assert_eq!(frames[1].header("destination"), Some("/topic/badge/42"));
    assert_eq!(frames[1].header("id"), Some("sub-1"));
}

#[test]
fn subscribe_twice_keeps_one_listener_per_topic() {
    let mut registry = SubscriptionRegistry::new();
    let identity = Identity::new(42);
    registry.subscribe(&identity);
    let frames = registry.subscribe(&identity);

    let commands = frames.iter().map(|f| f.command).collect::<Vec<_>>();
    assert_eq!(
        commands,
        vec![Command::Unsubscribe, Command::Subscribe, Command::Unsubscribe, Command::Subscribe]
    );
    assert_eq!(frames[0].header("id"), Some("sub-0"));
    assert_eq!(registry.active().len(), 2);
    assert_eq!(registry.active_for(TopicKind::Notification), 1);
    assert_eq!(registry.active_for(TopicKind::Badge), 1);
}

#[test]
fn route_ignores_replaced_subscription_ids() {
    let mut registry = SubscriptionRegistry::new();
    let identity = Identity::new(1);
    registry.subscribe(&identity);
    registry.subscribe(&identity);

    assert_eq!(registry.route("sub-0"), None);
    assert_eq!(registry.route("sub-2"), Some(TopicKind::Notification));
    assert_eq!(registry.route("sub-3"), Some(TopicKind::Badge));
}

#[test]
fn unsubscribe_detaches_only_owner() {
    let mut registry = SubscriptionRegistry::new();
    registry.subscribe(&Identity::new(1));

    assert!(registry.unsubscribe(&Identity::new(2)).is_empty());
    let frames = registry.unsubscribe(&Identity::new(1));
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|f| f.command == Command::Unsubscribe));
    assert!(registry.active().is_empty());
}

#[test]
fn identity_change_replaces_destinations() {
    let mut registry = SubscriptionRegistry::new();
    registry.subscribe(&Identity::new(1));
    registry.unsubscribe(&Identity::new(1));
    registry.subscribe(&Identity::new(2));

    let destinations = registry.active().iter().map(|s| s.destination.as_str()).collect::<Vec<_>>();
    assert_eq!(destinations, vec!["/topic/notification/2", "/topic/badge/2"]);
}

#[test]
fn reset_then_resubscribe_restarts_ids_without_unsubscribes() {
    let mut registry = SubscriptionRegistry::new();
    let identity = Identity::new(42);
    registry.subscribe(&identity);

    registry.reset();
    assert!(registry.active().is_empty());
    assert_eq!(registry.route("sub-0"), None);

    let frames = registry.subscribe(&identity);
    assert!(frames.iter().all(|f| f.command == Command::Subscribe));
    assert_eq!(registry.route("sub-0"), Some(TopicKind::Notification));
}
