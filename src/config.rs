//! Runtime configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5000;
pub const DEFAULT_HEARTBEAT_OUTGOING_MS: u64 = 4000;
pub const DEFAULT_HEARTBEAT_INCOMING_MS: u64 = 4000;
pub const DEFAULT_UNLOCK_TOAST_MS: u64 = 5000;
pub const DEFAULT_PUSH_TOAST_MS: u64 = 4000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_IDENTITY_FILE: &str = ".itda/identity.json";

/// Path segments of the STOMP endpoint under the API base. The server
/// registers `/ws` as a SockJS endpoint, which serves a raw WebSocket at
/// `{prefix}/websocket`.
pub const WS_PATH_SEGMENTS: [&str; 2] = ["ws", "websocket"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid websocket URL: {0}")]
    InvalidWsUrl(String),
}

/// Connection tuning for the realtime transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Full WebSocket endpoint, e.g. `ws://localhost:8080/ws/websocket`.
    pub ws_url: String,
    pub reconnect_delay: Duration,
    pub heartbeat_outgoing: Duration,
    pub heartbeat_incoming: Duration,
}

/// Lifetimes of the transient toasts raised by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToastConfig {
    pub unlock_ttl: Duration,
    pub push_ttl: Duration,
}

impl Default for ToastConfig {
    fn default() -> Self {
        Self {
            unlock_ttl: Duration::from_millis(DEFAULT_UNLOCK_TOAST_MS),
            push_ttl: Duration::from_millis(DEFAULT_PUSH_TOAST_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyConfig {
    pub api_base_url: String,
    pub connection: ConnectionConfig,
    pub toasts: ToastConfig,
    pub identity_file: PathBuf,
    pub request_timeout: Duration,
    /// Raw `Cookie` header value sent with REST calls (e.g. `JSESSIONID=...`).
    pub session_cookie: Option<String>,
}

impl NotifyConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `ITDA_API_BASE_URL`: default `http://localhost:8080`
    /// - `ITDA_WS_URL`: derived from the API base URL when absent
    /// - `ITDA_RECONNECT_DELAY_MS`: default 5000
    /// - `ITDA_HEARTBEAT_OUTGOING_MS` / `ITDA_HEARTBEAT_INCOMING_MS`: default 4000
    /// - `ITDA_UNLOCK_TOAST_MS`: default 5000
    /// - `ITDA_PUSH_TOAST_MS`: default 4000
    /// - `ITDA_IDENTITY_FILE`: default `.itda/identity.json`
    /// - `ITDA_REQUEST_TIMEOUT_SECS`: default 10
    /// - `ITDA_SESSION_COOKIE`: unset by default
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the API base URL is not HTTP(S) or the
    /// WebSocket URL is not WS(S).
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = normalize_base_url(
            &std::env::var("ITDA_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_owned()),
        )?;
        let ws_url = match std::env::var("ITDA_WS_URL").ok().filter(|s| !s.is_empty()) {
            Some(url) => parse_ws_url(&url)?,
            None => ws_url_from_base(&api_base_url)?,
        };

        let connection = ConnectionConfig {
            ws_url,
            reconnect_delay: Duration::from_millis(env_parse("ITDA_RECONNECT_DELAY_MS", DEFAULT_RECONNECT_DELAY_MS)),
            heartbeat_outgoing: Duration::from_millis(env_parse(
                "ITDA_HEARTBEAT_OUTGOING_MS",
                DEFAULT_HEARTBEAT_OUTGOING_MS,
            )),
            heartbeat_incoming: Duration::from_millis(env_parse(
                "ITDA_HEARTBEAT_INCOMING_MS",
                DEFAULT_HEARTBEAT_INCOMING_MS,
            )),
        };
        let toasts = ToastConfig {
            unlock_ttl: Duration::from_millis(env_parse("ITDA_UNLOCK_TOAST_MS", DEFAULT_UNLOCK_TOAST_MS)),
            push_ttl: Duration::from_millis(env_parse("ITDA_PUSH_TOAST_MS", DEFAULT_PUSH_TOAST_MS)),
        };
        let identity_file = std::env::var("ITDA_IDENTITY_FILE")
            .map_or_else(|_| PathBuf::from(DEFAULT_IDENTITY_FILE), PathBuf::from);
        let request_timeout =
            Duration::from_secs(env_parse("ITDA_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS));

        let session_cookie = std::env::var("ITDA_SESSION_COOKIE").ok().filter(|s| !s.is_empty());

        Ok(Self { api_base_url, connection, toasts, identity_file, request_timeout, session_cookie })
    }

    /// Apply explicit endpoint overrides (e.g. command-line flags) with the
    /// same validation as [`Self::from_env`]. A new API base without a
    /// WebSocket override re-derives the WebSocket endpoint from it.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn with_endpoints(mut self, api_base_url: Option<&str>, ws_url: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(base) = api_base_url {
            self.api_base_url = normalize_base_url(base)?;
            if ws_url.is_none() {
                self.connection.ws_url = ws_url_from_base(&self.api_base_url)?;
            }
        }
        if let Some(url) = ws_url {
            self.connection.ws_url = parse_ws_url(url)?;
        }
        Ok(self)
    }
}

/// Validate an HTTP(S) base URL and return it without a trailing `/`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBaseUrl`] for unparseable or non-HTTP(S) URLs.
pub fn normalize_base_url(base_url: &str) -> Result<String, ConfigError> {
    let url = parse_http_base(base_url)?;
    Ok(url.as_str().trim_end_matches('/').to_owned())
}

/// Derive the STOMP endpoint from an HTTP base URL
/// (`http://h:8080` -> `ws://h:8080/ws/websocket`).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBaseUrl`] for unparseable or non-HTTP(S) URLs.
pub fn ws_url_from_base(base_url: &str) -> Result<String, ConfigError> {
    let mut url = parse_http_base(base_url)?;
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|()| ConfigError::InvalidBaseUrl(base_url.to_owned()))?;
    url.path_segments_mut()
        .map_err(|()| ConfigError::InvalidBaseUrl(base_url.to_owned()))?
        .pop_if_empty()
        .extend(WS_PATH_SEGMENTS);
    Ok(url.into())
}

/// Validate an explicit WebSocket endpoint.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidWsUrl`] for unparseable URLs, schemes other
/// than `ws`/`wss`, or URLs without a host.
pub fn parse_ws_url(ws_url: &str) -> Result<String, ConfigError> {
    let url = Url::parse(ws_url.trim()).map_err(|e| ConfigError::InvalidWsUrl(format!("{ws_url}: {e}")))?;
    match url.scheme() {
        "ws" | "wss" if url.host_str().is_some() => Ok(url.into()),
        _ => Err(ConfigError::InvalidWsUrl(ws_url.to_owned())),
    }
}

fn parse_http_base(base_url: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(base_url.trim()).map_err(|e| ConfigError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(ConfigError::InvalidBaseUrl(base_url.to_owned())),
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
