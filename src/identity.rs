//! Persisted identity record and the key-value store it lives in.
//!
//! SYSTEM CONTEXT
//! ==============
//! The authenticated user is remembered across runs in a small string
//! key-value store (the `user` key holds a JSON record with `userId`).
//! Absence of a usable record is the normal logged-out state: the connection
//! manager and subscription registry simply stay idle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Store key holding the serialized [`Identity`].
pub const USER_KEY: &str = "user";

/// Store key holding a bare numeric user id used by development setups.
pub const DEV_USER_ID_KEY: &str = "devUserId";

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity store io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("identity store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The authenticated user owning the realtime subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn new(user_id: i64) -> Self {
        Self { user_id, email: None, username: None, nickname: None }
    }
}

/// Durable string key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, IdentityError>;

    /// # Errors
    ///
    /// Returns an error when the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), IdentityError>;

    /// # Errors
    ///
    /// Returns an error when the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<(), IdentityError>;
}

/// In-process store, used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, IdentityError> {
        let entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), IdentityError> {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), IdentityError> {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// Store backed by one JSON object on disk.
///
/// Writes go to a uniquely named sibling temp file which is then renamed
/// over the target, so a crash mid-write leaves the previous contents intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>, IdentityError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
        std::fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, IdentityError> {
        let map = self.read_map()?;
        Ok(map.get(key).and_then(Value::as_str).map(str::to_owned))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), IdentityError> {
        let mut map = self.read_map()?;
        map.insert(key.to_owned(), Value::String(value.to_owned()));
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), IdentityError> {
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// Resolve the current identity: the `user` record first, then `devUserId`.
///
/// An unparseable record is logged and skipped rather than reported.
///
/// # Errors
///
/// Returns an error only when the store itself cannot be read.
pub fn load_identity(store: &dyn KeyValueStore) -> Result<Option<Identity>, IdentityError> {
    if let Some(raw) = store.get(USER_KEY)? {
        match serde_json::from_str::<Identity>(&raw) {
            Ok(identity) => return Ok(Some(identity)),
            Err(e) => warn!(error = %e, "identity: ignoring unparseable user record"),
        }
    }

    let dev = store
        .get(DEV_USER_ID_KEY)?
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .map(Identity::new);
    Ok(dev)
}

/// Persist `identity` as the current user.
///
/// # Errors
///
/// Returns an error when the record cannot be serialized or stored.
pub fn save_identity(store: &dyn KeyValueStore, identity: &Identity) -> Result<(), IdentityError> {
    let raw = serde_json::to_string(identity)?;
    store.set(USER_KEY, &raw)
}

/// Forget the current user.
///
/// # Errors
///
/// Returns an error when the store cannot be written.
pub fn clear_identity(store: &dyn KeyValueStore) -> Result<(), IdentityError> {
    store.remove(USER_KEY)
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
