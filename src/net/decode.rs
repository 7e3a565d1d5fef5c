//! Event decoder: STOMP message bodies into typed domain events.
//!
//! DESIGN
//! ======
//! Every body is parsed as a JSON object first and the `type` discriminant is
//! checked before any other field is trusted. Known discriminants map to their
//! own variant; a missing or unrecognized discriminant falls through to the
//! generic notification shape.
//!
//! ERROR HANDLING
//! ==============
//! [`decode_event`] reports why a body was rejected; [`decode_or_discard`] is
//! what the connection loop calls, and it only logs. A bad frame never
//! interrupts the stream.

#[cfg(test)]
#[path = "decode_test.rs"]
mod decode_test;

use serde_json::Value;
use tracing::{debug, warn};

use super::subscription::TopicKind;
use super::types::{BadgeUnlockEvent, NotificationEvent, NotificationPayload};

pub const TYPE_BADGE_UNLOCKED: &str = "BADGE_UNLOCKED";
pub const TYPE_NEW_NOTIFICATION: &str = "NEW_NOTIFICATION";
pub const TYPE_NOTIFICATION_READ: &str = "NOTIFICATION_READ";
pub const TYPE_ALL_NOTIFICATIONS_READ: &str = "ALL_NOTIFICATIONS_READ";
pub const TYPE_UNREAD_COUNT_UPDATE: &str = "UNREAD_COUNT_UPDATE";

/// A decoded push event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Notification(NotificationEvent),
    BadgeUnlocked(BadgeUnlockEvent),
    /// Another device marked one notification read.
    NotificationRead { id: i64 },
    /// Another device marked everything read.
    AllRead,
    /// Server-side unread count; informational only.
    UnreadCount(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("body is not JSON: {0}")]
    NotJson(#[source] serde_json::Error),
    #[error("body is not a JSON object")]
    NotObject,
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
}

/// Decode one message body.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the body is not JSON, not an object, or does
/// not satisfy the schema selected by its discriminant.
pub fn decode_event(body: &str) -> Result<InboundEvent, DecodeError> {
    let value = serde_json::from_str::<Value>(body).map_err(DecodeError::NotJson)?;
    let Some(map) = value.as_object() else {
        return Err(DecodeError::NotObject);
    };

    let discriminant = map.get("type").and_then(Value::as_str).map(str::to_owned);
    match discriminant.as_deref() {
        Some(TYPE_BADGE_UNLOCKED) => serde_json::from_value::<BadgeUnlockEvent>(value)
            .map(InboundEvent::BadgeUnlocked)
            .map_err(|source| DecodeError::InvalidPayload { kind: "badge unlock", source }),
        Some(TYPE_NEW_NOTIFICATION) => {
            let inner = map
                .get("notification")
                .cloned()
                .ok_or(DecodeError::MissingField("notification"))?;
            parse_notification(inner)
        }
        Some(TYPE_NOTIFICATION_READ) => {
            let id = map
                .get("notificationId")
                .and_then(Value::as_i64)
                .ok_or(DecodeError::MissingField("notificationId"))?;
            Ok(InboundEvent::NotificationRead { id })
        }
        Some(TYPE_ALL_NOTIFICATIONS_READ) => Ok(InboundEvent::AllRead),
        Some(TYPE_UNREAD_COUNT_UPDATE) => {
            let count = map
                .get("unreadCount")
                .and_then(Value::as_u64)
                .ok_or(DecodeError::MissingField("unreadCount"))?;
            Ok(InboundEvent::UnreadCount(count))
        }
        _ => parse_notification(value),
    }
}

fn parse_notification(value: Value) -> Result<InboundEvent, DecodeError> {
    serde_json::from_value::<NotificationPayload>(value)
        .map(|payload| InboundEvent::Notification(payload.into()))
        .map_err(|source| DecodeError::InvalidPayload { kind: "notification", source })
}

/// Decode a body received on `topic`, logging and dropping anything invalid.
#[must_use]
pub fn decode_or_discard(topic: TopicKind, body: &str) -> Option<InboundEvent> {
    match decode_event(body) {
        Ok(event) => {
            debug!(topic = topic.as_str(), ?event, "decode: event");
            Some(event)
        }
        Err(e) => {
            warn!(topic = topic.as_str(), error = %e, "decode: discarding frame");
            None
        }
    }
}
