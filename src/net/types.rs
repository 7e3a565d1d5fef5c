//! Wire and domain types for pushed events and REST payloads.
//!
//! DESIGN
//! ======
//! The back end speaks camelCase JSON. Wire structs mirror that shape and are
//! converted into the domain types the rest of the crate works with, so field
//! renames stay at this boundary.

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

// =============================================================================
// NOTIFICATION KIND
// =============================================================================

/// Category of a notification. Unknown categories collapse to [`System`](Self::System).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Follow,
    FollowRequest,
    FollowAccept,
    Message,
    Meeting,
    MeetingJoin,
    MeetingFollow,
    MeetingReminder,
    Review,
    ReviewRequest,
    Badge,
    #[default]
    #[serde(other)]
    System,
}

impl NotificationKind {
    #[must_use]
    pub fn icon(self) -> &'static str {
        match self {
            Self::Follow => "👤",
            Self::FollowRequest => "🔔",
            Self::FollowAccept => "✅",
            Self::Message => "💬",
            Self::Meeting => "📅",
            Self::MeetingJoin => "🎉",
            Self::MeetingFollow => "💡",
            Self::MeetingReminder => "⏰",
            Self::Review => "⭐",
            Self::ReviewRequest => "✍️",
            Self::Badge => "🏆",
            Self::System => "📢",
        }
    }
}

// =============================================================================
// NOTIFICATION
// =============================================================================

/// Who triggered a notification, when the back end says so.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SenderRef {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub profile_image: Option<String>,
}

/// One entry of the canonical notification collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NotificationEvent {
    pub id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub content: String,
    pub link_url: Option<String>,
    pub related_id: Option<i64>,
    pub is_read: bool,
    pub sent_at: Option<String>,
    pub sender: Option<SenderRef>,
}

/// Notification as serialized by the back end (push and REST alike).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub notification_id: i64,
    #[serde(default)]
    pub notification_type: NotificationKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub related_id: Option<i64>,
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub sender_profile_image: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub sent_at: Option<String>,
}

impl From<NotificationPayload> for NotificationEvent {
    fn from(p: NotificationPayload) -> Self {
        let sender = if p.sender_id.is_some() || p.sender_name.is_some() {
            Some(SenderRef { id: p.sender_id, name: p.sender_name, profile_image: p.sender_profile_image })
        } else {
            None
        };
        Self {
            id: p.notification_id,
            kind: p.notification_type,
            title: p.title,
            content: p.content,
            link_url: p.link_url,
            related_id: p.related_id,
            is_read: p.is_read,
            sent_at: p.sent_at,
            sender,
        }
    }
}

// =============================================================================
// BADGE UNLOCK
// =============================================================================

/// Pushed once when the user earns a badge. Consumed by the toast layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeUnlockEvent {
    pub notification_id: i64,
    pub badge_id: i64,
    pub badge_code: String,
    pub badge_name: String,
    pub badge_icon: String,
    pub badge_grade: String,
    pub badge_category: String,
    pub badge_description: String,
    pub link_url: String,
    pub sent_at: String,
    pub is_read: bool,
}

// =============================================================================
// REST PAYLOADS
// =============================================================================

/// Body of `GET /api/notifications/all`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationList {
    #[serde(default)]
    pub notifications: Vec<NotificationPayload>,
    #[serde(default)]
    pub unread_count: u64,
    #[serde(default)]
    pub total_count: u64,
}

/// One row of `GET /api/badges` / `GET /api/badges/unlocked`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBadge {
    pub badge_id: i64,
    pub badge_code: String,
    #[serde(default)]
    pub badge_name: String,
    #[serde(default)]
    pub badge_icon: Option<String>,
    #[serde(default)]
    pub badge_grade: Option<String>,
    #[serde(default)]
    pub badge_category: Option<String>,
    #[serde(default)]
    pub badge_description: Option<String>,
    #[serde(default)]
    pub is_unlocked: bool,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub unlocked_at: Option<String>,
}
