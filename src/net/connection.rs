//! STOMP connection manager with automatic reconnection.
//!
//! DESIGN
//! ======
//! `ConnectionManager` owns at most one background task per identity. The
//! task runs an explicit state machine:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected (drop) -> Connecting ...
//! ```
//!
//! On every transition into `Connected` the subscription registry is reset
//! and both topics are re-attached before the read loop starts, so no
//! inbound MESSAGE is processed ahead of its subscription. Only an explicit
//! [`ConnectionManager::disconnect`] (or dropping the manager) ends the loop.
//!
//! ERROR HANDLING
//! ==============
//! Nothing escapes the task. Transport drops and broker `ERROR` frames are
//! logged, status returns to `Disconnected`, and the next attempt is
//! scheduled after the fixed reconnect delay. Malformed frames are logged and
//! skipped without touching the connection.

#[cfg(test)]
#[path = "connection_test.rs"]
mod connection_test;

use std::sync::Arc;
use std::time::Duration;

use stomp::{Command, Frame, HeartBeat};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::decode::{InboundEvent, decode_or_discard};
use super::subscription::{SubscriptionRegistry, TopicKind};
use super::transport::{Connector, Link, TransportError, host_of};
use crate::config::ConnectionConfig;
use crate::identity::Identity;

/// Upper bound on waiting for `CONNECTED` after sending `CONNECT`.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection lifecycle state, published on a watch channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Why one connection attempt ended.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("broker reported error: {0}")]
    Broker(String),
    #[error("unexpected {0} frame during handshake")]
    UnexpectedFrame(&'static str),
    #[error("malformed handshake frame: {0}")]
    Handshake(#[from] stomp::CodecError),
    #[error("no CONNECTED frame within {0:?}")]
    HandshakeTimeout(Duration),
    #[error("no frame within {0:?}")]
    Silent(Duration),
}

impl ConnectError {
    /// Negotiation failure reported by the protocol layer, as opposed to a
    /// transport drop.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Broker(_) | Self::UnexpectedFrame(_) | Self::Handshake(_))
    }
}

/// Receives every decoded push event, in delivery order per topic.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_event(&self, topic: TopicKind, event: InboundEvent);
}

struct ActiveConnection {
    identity: Identity,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns the realtime transport for one authenticated identity at a time.
pub struct ConnectionManager {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    handler: Arc<dyn EventHandler>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    active: Option<ActiveConnection>,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>, handler: Arc<dyn EventHandler>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self { config, connector, handler, status: Arc::new(status), active: None }
    }

    /// Start (or keep) the connection for `identity`.
    ///
    /// A no-op while a task for the same user is alive. A different user
    /// tears the current connection down first. Returns immediately; progress
    /// is observable through [`Self::status`].
    pub fn connect(&mut self, identity: Identity) {
        if let Some(active) = &self.active
            && active.identity.user_id == identity.user_id
            && !active.task.is_finished()
        {
            debug!(user_id = identity.user_id, "connection: already active");
            return;
        }
        self.disconnect();

        let (cancel, cancel_rx) = watch::channel(false);
        let worker = Worker {
            identity: identity.clone(),
            config: self.config.clone(),
            connector: Arc::clone(&self.connector),
            handler: Arc::clone(&self.handler),
            status: StatusCell { tx: Arc::clone(&self.status), cancel: cancel_rx.clone() },
            cancel: cancel_rx,
            registry: SubscriptionRegistry::new(),
        };
        info!(user_id = identity.user_id, url = %self.config.ws_url, "connection: starting");
        let task = tokio::spawn(worker.run());
        self.active = Some(ActiveConnection { identity, cancel, task });
    }

    /// Close the transport and cancel any pending reconnect. Always safe.
    pub fn disconnect(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        // Cancel under the status lock so the task cannot publish after this.
        self.status.send_modify(|status| {
            let _ = active.cancel.send(true);
            *status = ConnectionStatus::Disconnected;
        });
        info!(user_id = active.identity.user_id, "connection: disconnected by caller");
    }

    /// [`Self::disconnect`], then wait for the task to finish its teardown.
    pub async fn shutdown(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        self.status.send_modify(|status| {
            let _ = active.cancel.send(true);
            *status = ConnectionStatus::Disconnected;
        });
        if let Err(e) = active.task.await {
            warn!(error = %e, "connection: task ended abnormally");
        }
        info!(user_id = active.identity.user_id, "connection: shut down");
    }

    #[must_use]
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    #[must_use]
    pub fn current_status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.active.as_ref().map(|a| &a.identity)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// =============================================================================
// WORKER
// =============================================================================

/// Status publisher that goes quiet once its connection is cancelled.
struct StatusCell {
    tx: Arc<watch::Sender<ConnectionStatus>>,
    cancel: watch::Receiver<bool>,
}

impl StatusCell {
    fn set(&self, next: ConnectionStatus) {
        self.tx.send_if_modified(|status| {
            if *self.cancel.borrow() || *status == next {
                return false;
            }
            *status = next;
            true
        });
    }
}

enum Exit {
    Cancelled,
    Dropped(ConnectError),
}

struct Worker {
    identity: Identity,
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    handler: Arc<dyn EventHandler>,
    status: StatusCell,
    cancel: watch::Receiver<bool>,
    registry: SubscriptionRegistry,
}

impl Worker {
    async fn run(mut self) {
        let user_id = self.identity.user_id;
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            self.status.set(ConnectionStatus::Connecting);
            debug!(user_id, attempt, "connection: connecting");

            match self.session().await {
                Exit::Cancelled => return,
                Exit::Dropped(e) if e.is_protocol() => {
                    error!(user_id, attempt, error = %e, "connection: protocol failure");
                }
                Exit::Dropped(e) => {
                    warn!(user_id, attempt, error = %e, "connection: transport dropped");
                }
            }
            self.status.set(ConnectionStatus::Disconnected);

            let delay = self.config.reconnect_delay;
            info!(user_id, delay_ms = duration_ms(delay), "connection: reconnect scheduled");
            tokio::select! {
                biased;
                () = cancelled(&mut self.cancel) => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One transport lifetime: open, handshake, subscribe, read until it ends.
    async fn session(&mut self) -> Exit {
        let opened = tokio::select! {
            biased;
            () = cancelled(&mut self.cancel) => return Exit::Cancelled,
            opened = self.connector.open(&self.config.ws_url) => opened,
        };
        let mut link = match opened {
            Ok(link) => link,
            Err(e) => return Exit::Dropped(e.into()),
        };

        let heart_beat = match self.handshake(link.as_mut()).await {
            Ok(Some(heart_beat)) => heart_beat,
            Ok(None) => {
                link.close().await;
                return Exit::Cancelled;
            }
            Err(e) => {
                link.close().await;
                return Exit::Dropped(e);
            }
        };

        self.status.set(ConnectionStatus::Connected);
        info!(user_id = self.identity.user_id, ?heart_beat, "connection: connected");

        self.registry.reset();
        for frame in self.registry.subscribe(&self.identity) {
            if let Err(e) = send_frame(link.as_mut(), &frame).await {
                return Exit::Dropped(e.into());
            }
        }

        let exit = self.read_loop(link.as_mut(), heart_beat).await;
        if matches!(exit, Exit::Cancelled) {
            self.teardown(link.as_mut()).await;
        }
        exit
    }

    /// Send `CONNECT` and wait for `CONNECTED`. `Ok(None)` means cancelled.
    async fn handshake(&mut self, link: &mut dyn Link) -> Result<Option<HeartBeat>, ConnectError> {
        let ours = HeartBeat::new(
            duration_ms(self.config.heartbeat_outgoing),
            duration_ms(self.config.heartbeat_incoming),
        );
        let host = host_of(&self.config.ws_url).unwrap_or_default();
        let connect = Frame::connect(&host, ours);
        send_frame(link, &connect).await?;

        let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
        loop {
            let next = tokio::select! {
                biased;
                () = cancelled(&mut self.cancel) => return Ok(None),
                () = tokio::time::sleep_until(deadline) => {
                    return Err(ConnectError::HandshakeTimeout(HANDSHAKE_TIMEOUT));
                }
                next = link.recv() => next,
            };
            let text = match next {
                Some(Ok(text)) => text,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(TransportError::Closed.into()),
            };
            let Some(frame) = stomp::decode_frame(&text)? else {
                continue;
            };
            return match frame.command {
                Command::Connected => {
                    let theirs = frame.header("heart-beat").and_then(HeartBeat::parse).unwrap_or_default();
                    debug!(version = frame.header("version"), "connection: CONNECTED");
                    Ok(Some(HeartBeat::negotiate(ours, theirs)))
                }
                Command::Error => Err(broker_error(&frame)),
                other => Err(ConnectError::UnexpectedFrame(other.as_str())),
            };
        }
    }

    async fn read_loop(&mut self, link: &mut dyn Link, heart_beat: HeartBeat) -> Exit {
        let mut outgoing = (heart_beat.outgoing_ms > 0).then(|| {
            let period = Duration::from_millis(heart_beat.outgoing_ms);
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        let silence = (heart_beat.incoming_ms > 0).then(|| Duration::from_millis(heart_beat.incoming_ms * 2));
        let mut last_seen = Instant::now();

        loop {
            let deadline = silence.map(|s| last_seen + s);
            let next = tokio::select! {
                biased;
                () = cancelled(&mut self.cancel) => return Exit::Cancelled,
                () = tick(&mut outgoing) => {
                    if let Err(e) = link.send(stomp::HEARTBEAT.to_owned()).await {
                        return Exit::Dropped(e.into());
                    }
                    continue;
                }
                () = until(deadline) => {
                    return Exit::Dropped(ConnectError::Silent(silence.unwrap_or_default()));
                }
                next = link.recv() => next,
            };
            last_seen = Instant::now();

            let text = match next {
                Some(Ok(text)) => text,
                Some(Err(e)) => return Exit::Dropped(e.into()),
                None => return Exit::Dropped(TransportError::Closed.into()),
            };
            let frame = match stomp::decode_frame(&text) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, "connection: discarding undecodable frame");
                    continue;
                }
            };
            match frame.command {
                Command::Message => self.dispatch(&frame).await,
                Command::Error => return Exit::Dropped(broker_error(&frame)),
                other => debug!(command = other.as_str(), "connection: ignoring frame"),
            }
        }
    }

    async fn dispatch(&self, frame: &Frame) {
        let Some(sub_id) = frame.header("subscription") else {
            warn!(destination = frame.header("destination"), "connection: MESSAGE without subscription");
            return;
        };
        let Some(topic) = self.registry.route(sub_id) else {
            debug!(subscription = sub_id, "connection: MESSAGE for stale subscription");
            return;
        };
        if let Some(event) = decode_or_discard(topic, &frame.body) {
            self.handler.on_event(topic, event).await;
        }
    }

    async fn teardown(&mut self, link: &mut dyn Link) {
        let mut frames = self.registry.unsubscribe(&self.identity);
        frames.push(Frame::disconnect(None));
        for frame in &frames {
            if send_frame(link, frame).await.is_err() {
                break;
            }
        }
        link.close().await;
        debug!(user_id = self.identity.user_id, "connection: transport closed");
    }
}

async fn send_frame(link: &mut dyn Link, frame: &Frame) -> Result<(), TransportError> {
    link.send(stomp::encode_frame(frame)).await
}

fn broker_error(frame: &Frame) -> ConnectError {
    let message = frame
        .header("message")
        .map_or_else(|| frame.body.trim().to_owned(), str::to_owned);
    ConnectError::Broker(message)
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Resolves once `rx` reads `true` or its sender is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
