use super::*;
use std::sync::Mutex;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const VARS: &[&str] = &[
    "ITDA_API_BASE_URL",
    "ITDA_WS_URL",
    "ITDA_RECONNECT_DELAY_MS",
    "ITDA_HEARTBEAT_OUTGOING_MS",
    "ITDA_HEARTBEAT_INCOMING_MS",
    "ITDA_UNLOCK_TOAST_MS",
    "ITDA_PUSH_TOAST_MS",
    "ITDA_IDENTITY_FILE",
    "ITDA_REQUEST_TIMEOUT_SECS",
    "ITDA_SESSION_COOKIE",
];

/// # Safety
/// Callers hold `ENV_LOCK` so no other test touches the environment concurrently.
unsafe fn clear_itda_env() {
    for var in VARS {
        unsafe { std::env::remove_var(var) };
    }
}

#[test]
fn from_env_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_itda_env() };

    let cfg = NotifyConfig::from_env().unwrap();
    assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
    assert_eq!(cfg.connection.ws_url, "ws://localhost:8080/ws/websocket");
    assert_eq!(cfg.connection.reconnect_delay, Duration::from_secs(5));
    assert_eq!(cfg.connection.heartbeat_outgoing, Duration::from_millis(4000));
    assert_eq!(cfg.connection.heartbeat_incoming, Duration::from_millis(4000));
    assert_eq!(cfg.toasts, ToastConfig::default());
    assert_eq!(cfg.toasts.unlock_ttl, Duration::from_secs(5));
    assert_eq!(cfg.toasts.push_ttl, Duration::from_secs(4));
    assert_eq!(cfg.identity_file, PathBuf::from(DEFAULT_IDENTITY_FILE));
    assert_eq!(cfg.request_timeout, Duration::from_secs(10));
    assert!(cfg.session_cookie.is_none());
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_itda_env();
        std::env::set_var("ITDA_API_BASE_URL", "https://api.itda.test/");
        std::env::set_var("ITDA_RECONNECT_DELAY_MS", "250");
        std::env::set_var("ITDA_HEARTBEAT_OUTGOING_MS", "0");
        std::env::set_var("ITDA_PUSH_TOAST_MS", "1000");
        std::env::set_var("ITDA_IDENTITY_FILE", "/tmp/itda-user.json");
    }

    let cfg = NotifyConfig::from_env().unwrap();
    assert_eq!(cfg.api_base_url, "https://api.itda.test");
    assert_eq!(cfg.connection.ws_url, "wss://api.itda.test/ws/websocket");
    assert_eq!(cfg.connection.reconnect_delay, Duration::from_millis(250));
    assert_eq!(cfg.connection.heartbeat_outgoing, Duration::ZERO);
    assert_eq!(cfg.toasts.push_ttl, Duration::from_secs(1));
    assert_eq!(cfg.identity_file, PathBuf::from("/tmp/itda-user.json"));

    unsafe { clear_itda_env() };
}

#[test]
fn from_env_explicit_ws_url_wins() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_itda_env();
        std::env::set_var("ITDA_WS_URL", "ws://push.itda.test:9000/ws");
    }

    let cfg = NotifyConfig::from_env().unwrap();
    assert_eq!(cfg.connection.ws_url, "ws://push.itda.test:9000/ws");

    unsafe { clear_itda_env() };
}

#[test]
fn from_env_ignores_unparseable_numbers() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_itda_env();
        std::env::set_var("ITDA_RECONNECT_DELAY_MS", "soon");
    }

    let cfg = NotifyConfig::from_env().unwrap();
    assert_eq!(cfg.connection.reconnect_delay, Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS));

    unsafe { clear_itda_env() };
}

#[test]
fn from_env_rejects_non_http_base() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_itda_env();
        std::env::set_var("ITDA_API_BASE_URL", "ftp://itda.test");
    }

    let err = NotifyConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBaseUrl(_)));

    unsafe { clear_itda_env() };
}

#[test]
fn from_env_rejects_non_websocket_override() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_itda_env();
        std::env::set_var("ITDA_WS_URL", "http://push.itda.test/ws");
    }

    let err = NotifyConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidWsUrl(_)));

    unsafe { clear_itda_env() };
}

// =============================================================================
// URL HELPERS
// =============================================================================

#[test]
fn ws_url_from_base_targets_raw_websocket_under_sockjs_prefix() {
    assert_eq!(ws_url_from_base("http://127.0.0.1:8080").unwrap(), "ws://127.0.0.1:8080/ws/websocket");
    assert_eq!(ws_url_from_base("https://itda.app/").unwrap(), "wss://itda.app/ws/websocket");
    assert_eq!(ws_url_from_base("https://itda.app/backend/").unwrap(), "wss://itda.app/backend/ws/websocket");
}

#[test]
fn ws_url_from_base_accepts_any_scheme_case() {
    assert_eq!(ws_url_from_base("HTTP://host:8080").unwrap(), "ws://host:8080/ws/websocket");
}

#[test]
fn ws_url_from_base_rejects_invalid_urls() {
    assert!(matches!(ws_url_from_base("itda.app"), Err(ConfigError::InvalidBaseUrl(_))));
    assert!(matches!(ws_url_from_base("http://a b"), Err(ConfigError::InvalidBaseUrl(_))));
    assert!(matches!(ws_url_from_base("ftp://itda.app"), Err(ConfigError::InvalidBaseUrl(_))));
}

#[test]
fn normalize_base_url_trims_and_validates() {
    assert_eq!(normalize_base_url("https://api.itda.test/").unwrap(), "https://api.itda.test");
    assert_eq!(normalize_base_url("HTTP://Host:8080").unwrap(), "http://host:8080");
    assert!(normalize_base_url("ws://api.itda.test").is_err());
}

#[test]
fn parse_ws_url_accepts_only_websocket_schemes() {
    assert_eq!(parse_ws_url("wss://push.itda.test/ws/websocket").unwrap(), "wss://push.itda.test/ws/websocket");
    assert!(matches!(parse_ws_url("https://push.itda.test/ws"), Err(ConfigError::InvalidWsUrl(_))));
    assert!(matches!(parse_ws_url("not a url"), Err(ConfigError::InvalidWsUrl(_))));
}

// =============================================================================
// OVERRIDES
// =============================================================================

fn base_config() -> NotifyConfig {
    NotifyConfig {
        api_base_url: DEFAULT_API_BASE_URL.to_owned(),
        connection: ConnectionConfig {
            ws_url: "ws://localhost:8080/ws/websocket".to_owned(),
            reconnect_delay: Duration::from_secs(5),
            heartbeat_outgoing: Duration::from_secs(4),
            heartbeat_incoming: Duration::from_secs(4),
        },
        toasts: ToastConfig::default(),
        identity_file: PathBuf::from(DEFAULT_IDENTITY_FILE),
        request_timeout: Duration::from_secs(10),
        session_cookie: None,
    }
}

#[test]
fn with_endpoints_rederives_ws_url_from_new_base() {
    let cfg = base_config().with_endpoints(Some("https://api.itda.test/"), None).unwrap();
    assert_eq!(cfg.api_base_url, "https://api.itda.test");
    assert_eq!(cfg.connection.ws_url, "wss://api.itda.test/ws/websocket");
}

#[test]
fn with_endpoints_explicit_ws_url_wins() {
    let cfg = base_config()
        .with_endpoints(Some("https://api.itda.test"), Some("ws://push.itda.test:9000/ws"))
        .unwrap();
    assert_eq!(cfg.api_base_url, "https://api.itda.test");
    assert_eq!(cfg.connection.ws_url, "ws://push.itda.test:9000/ws");
}

#[test]
fn with_endpoints_validates_base_even_with_ws_override() {
    let err = base_config().with_endpoints(Some("ftp://x"), Some("ws://push.itda.test/ws")).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBaseUrl(_)));

    let err = base_config().with_endpoints(None, Some("ftp://push.itda.test")).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidWsUrl(_)));
}

#[test]
fn with_endpoints_without_overrides_keeps_config() {
    assert_eq!(base_config().with_endpoints(None, None).unwrap(), base_config());
}
