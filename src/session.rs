//! Session lifecycle: one state container plus one connection per identity.
//!
//! DESIGN
//! ======
//! `NotifySession` is the scoped acquisition of the realtime resources.
//! `start` builds the state container and connects; `shutdown` tears down
//! and waits; dropping the session without `shutdown` still cancels the
//! reconnect loop and closes the transport.
//!
//! Session confirmation after a social login is a separate fixed-delay poll
//! against `GET /api/auth/session`.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::NotifyConfig;
use crate::identity::{Identity, IdentityError, KeyValueStore, load_identity};
use crate::net::api::{ApiError, SessionBackend};
use crate::net::connection::{ConnectionManager, ConnectionStatus, EventHandler};
use crate::net::transport::Connector;
use crate::state::NotifyState;

pub const DEFAULT_CONFIRM_ATTEMPTS: u32 = 15;
pub const DEFAULT_CONFIRM_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not confirmed after {attempts} attempts")]
    NotConfirmed { attempts: u32 },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Fixed-delay, capped retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_CONFIRM_ATTEMPTS, delay: DEFAULT_CONFIRM_DELAY }
    }
}

pub struct NotifySession {
    identity: Identity,
    state: Arc<NotifyState>,
    connection: ConnectionManager,
}

impl NotifySession {
    /// Build fresh state for `identity` and start connecting.
    pub fn start(config: &NotifyConfig, identity: Identity, connector: Arc<dyn Connector>) -> Self {
        let state = Arc::new(NotifyState::new(config.toasts));
        let handler: Arc<dyn EventHandler> = state.clone();
        let mut connection = ConnectionManager::new(config.connection.clone(), connector, handler);
        connection.connect(identity.clone());
        info!(user_id = identity.user_id, "session: started");
        Self { identity, state, connection }
    }

    /// Start for whoever the store says is logged in. `Ok(None)` is the idle,
    /// logged-out state.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be read.
    pub fn start_from_store(
        config: &NotifyConfig,
        store: &dyn KeyValueStore,
        connector: Arc<dyn Connector>,
    ) -> Result<Option<Self>, SessionError> {
        let Some(identity) = load_identity(store)? else {
            debug!("session: no identity, staying idle");
            return Ok(None);
        };
        Ok(Some(Self::start(config, identity, connector)))
    }

    /// Move the session to another user: the old subscriptions and transport
    /// are torn down, local state is reset, then the new user connects.
    pub async fn switch_identity(&mut self, identity: Identity) {
        if identity.user_id == self.identity.user_id {
            self.identity = identity;
            return;
        }
        info!(from = self.identity.user_id, to = identity.user_id, "session: switching identity");
        self.connection.shutdown().await;
        self.state.reset().await;
        self.connection.connect(identity.clone());
        self.identity = identity;
    }

    /// Deterministic teardown: unsubscribe, close, wait for the task.
    pub async fn shutdown(mut self) {
        self.connection.shutdown().await;
        self.state.presenter().clear();
        info!(user_id = self.identity.user_id, "session: shut down");
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub fn state(&self) -> &Arc<NotifyState> {
        &self.state
    }

    #[must_use]
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection.status()
    }
}

/// Poll the session endpoint until it reports an authenticated user.
///
/// Retries on 401 and transport errors with a fixed delay; any other failure
/// is returned at once.
///
/// # Errors
///
/// Returns [`SessionError::NotConfirmed`] once `policy.max_attempts` is spent,
/// or [`SessionError::Api`] for a non-retryable failure.
pub async fn confirm_session<B>(backend: &B, policy: RetryPolicy) -> Result<Identity, SessionError>
where
    B: SessionBackend + ?Sized,
{
    for attempt in 1..=policy.max_attempts {
        match backend.check_session().await {
            Ok(identity) => {
                info!(user_id = identity.user_id, attempt, "session: confirmed");
                return Ok(identity);
            }
            Err(e) if e.is_retryable() => {
                debug!(attempt, max = policy.max_attempts, error = %e, "session: not confirmed yet");
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
            Err(e) => {
                warn!(attempt, error = %e, "session: confirmation failed");
                return Err(e.into());
            }
        }
    }
    Err(SessionError::NotConfirmed { attempts: policy.max_attempts })
}
