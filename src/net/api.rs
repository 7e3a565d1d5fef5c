//! REST collaborator client for notification, badge, and session endpoints.
//!
//! ERROR HANDLING
//! ==============
//! Every call returns `Result<_, ApiError>`. A 401 maps to
//! [`ApiError::Unauthorized`] so session polling can tell "not yet" from a
//! hard failure; other non-2xx statuses keep their body for the caller.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{NotificationList, UserBadge};
use crate::config::NotifyConfig;
use crate::identity::Identity;

/// Header carrying the acting user for the badge endpoints.
pub const USER_ID_HEADER: &str = "X-User-Id";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("session is not authenticated")]
    Unauthorized,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

impl ApiError {
    /// Worth another attempt when polling: unauthenticated or never reached the server.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Http(_))
    }
}

// =============================================================================
// SEAMS
// =============================================================================

#[async_trait::async_trait]
pub trait NotificationBackend: Send + Sync {
    async fn fetch_all_notifications(&self, user_id: i64) -> Result<NotificationList, ApiError>;
    async fn fetch_unread_count(&self, user_id: i64) -> Result<u64, ApiError>;
    async fn mark_as_read(&self, notification_id: i64) -> Result<(), ApiError>;
    /// Returns how many notifications the server flipped.
    async fn mark_all_read(&self, user_id: i64) -> Result<u64, ApiError>;
    async fn delete_notification(&self, notification_id: i64) -> Result<(), ApiError>;
    async fn delete_all(&self, user_id: i64) -> Result<(), ApiError>;
}

#[async_trait::async_trait]
pub trait BadgeBackend: Send + Sync {
    async fn fetch_badges(&self, user_id: i64) -> Result<Vec<UserBadge>, ApiError>;
    async fn fetch_unlocked_badges(&self, user_id: i64) -> Result<Vec<UserBadge>, ApiError>;
    async fn update_all_badge_progress(&self, user_id: i64) -> Result<(), ApiError>;
    async fn update_badge_progress(&self, user_id: i64, badge_code: &str) -> Result<(), ApiError>;
}

#[async_trait::async_trait]
pub trait SessionBackend: Send + Sync {
    /// The identity behind the current server session.
    async fn check_session(&self) -> Result<Identity, ApiError>;
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnreadCountResponse {
    unread_count: u64,
}

#[derive(Deserialize)]
struct MarkAllReadResponse {
    #[serde(default)]
    count: u64,
}

/// `reqwest`-backed implementation of every backend seam.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns an error if the cookie is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration, session_cookie: Option<&str>) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = session_cookie {
            headers.insert(COOKIE, HeaderValue::from_str(cookie)?);
        }
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn from_config(config: &NotifyConfig) -> Result<Self, ApiError> {
        Self::new(&config.api_base_url, config.request_timeout, config.session_cookie.as_deref())
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        check_status(status, &body)?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        check_status(status, &body)
    }
}

#[async_trait::async_trait]
impl NotificationBackend for ApiClient {
    async fn fetch_all_notifications(&self, user_id: i64) -> Result<NotificationList, ApiError> {
        debug!(user_id, "api: fetch all notifications");
        self.send_json(self.http.get(self.url(&notifications_all_path(user_id)))).await
    }

    async fn fetch_unread_count(&self, user_id: i64) -> Result<u64, ApiError> {
        let url = self.url(&unread_count_path(user_id));
        let body: UnreadCountResponse = self.send_json(self.http.get(url)).await?;
        Ok(body.unread_count)
    }

    async fn mark_as_read(&self, notification_id: i64) -> Result<(), ApiError> {
        self.send_empty(self.http.patch(self.url(&mark_read_path(notification_id)))).await
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, ApiError> {
        let url = self.url(&mark_all_read_path(user_id));
        let body: MarkAllReadResponse = self.send_json(self.http.patch(url)).await?;
        Ok(body.count)
    }

    async fn delete_notification(&self, notification_id: i64) -> Result<(), ApiError> {
        self.send_empty(self.http.delete(self.url(&notification_path(notification_id)))).await
    }

    async fn delete_all(&self, user_id: i64) -> Result<(), ApiError> {
        self.send_empty(self.http.delete(self.url(&notifications_all_path(user_id)))).await
    }
}

#[async_trait::async_trait]
impl BadgeBackend for ApiClient {
    async fn fetch_badges(&self, user_id: i64) -> Result<Vec<UserBadge>, ApiError> {
        let request = self.http.get(self.url("/api/badges")).header(USER_ID_HEADER, user_id.to_string());
        self.send_json(request).await
    }

    async fn fetch_unlocked_badges(&self, user_id: i64) -> Result<Vec<UserBadge>, ApiError> {
        let request = self
            .http
            .get(self.url("/api/badges/unlocked"))
            .header(USER_ID_HEADER, user_id.to_string());
        self.send_json(request).await
    }

    async fn update_all_badge_progress(&self, user_id: i64) -> Result<(), ApiError> {
        let request = self
            .http
            .post(self.url("/api/badges/update-all"))
            .header(USER_ID_HEADER, user_id.to_string());
        self.send_empty(request).await
    }

    async fn update_badge_progress(&self, user_id: i64, badge_code: &str) -> Result<(), ApiError> {
        let url = badge_update_url(&self.base_url, badge_code)?;
        let request = self.http.post(url).header(USER_ID_HEADER, user_id.to_string());
        self.send_empty(request).await
    }
}

#[async_trait::async_trait]
impl SessionBackend for ApiClient {
    async fn check_session(&self) -> Result<Identity, ApiError> {
        self.send_json(self.http.get(self.url("/api/auth/session"))).await
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn check_status(status: StatusCode, body: &str) -> Result<(), ApiError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        return Err(ApiError::Status { status: status.as_u16(), body: body.to_owned() });
    }
    Ok(())
}

fn notifications_all_path(user_id: i64) -> String {
    format!("/api/notifications/all?userId={user_id}")
}

fn unread_count_path(user_id: i64) -> String {
    format!("/api/notifications/unread/count?userId={user_id}")
}

fn mark_read_path(notification_id: i64) -> String {
    format!("/api/notifications/{notification_id}/read")
}

fn mark_all_read_path(user_id: i64) -> String {
    format!("/api/notifications/read-all?userId={user_id}")
}

fn notification_path(notification_id: i64) -> String {
    format!("/api/notifications/{notification_id}")
}

/// `POST /api/badges/{code}/update` with `code` percent-encoded as one segment.
fn badge_update_url(base_url: &str, badge_code: &str) -> Result<Url, ApiError> {
    let mut url = Url::parse(&format!("{base_url}/api/badges")).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| ApiError::InvalidUrl(base_url.to_owned()))?
        .push(badge_code)
        .push("update");
    Ok(url)
}
