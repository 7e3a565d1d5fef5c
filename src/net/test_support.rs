//! Channel-backed transport fakes shared by the connection and session tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use stomp::{Command, Frame};
use tokio::sync::mpsc;

use super::transport::{Connector, Link, TransportError};
use crate::config::ConnectionConfig;

pub(crate) fn test_config() -> ConnectionConfig {
    ConnectionConfig {
        ws_url: "ws://itda.test:8080/ws".to_owned(),
        reconnect_delay: Duration::from_secs(5),
        heartbeat_outgoing: Duration::from_secs(4),
        heartbeat_incoming: Duration::from_secs(4),
    }
}

pub(crate) fn message(subscription: &str, body: &str) -> Frame {
    Frame::new(Command::Message)
        .with_header("subscription", subscription)
        .with_header("destination", "/topic/notification/42")
        .with_header("message-id", "m-1")
        .with_body(body)
}

/// Server half of one fake socket.
pub(crate) struct ServerSide {
    pub(crate) from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<String>,
}

impl ServerSide {
    /// Next non-heartbeat frame written by the client.
    pub(crate) async fn expect_frame(&mut self) -> Frame {
        loop {
            let text = self.from_client.recv().await.expect("client frame");
            if let Some(frame) = stomp::decode_frame(&text).expect("decodable") {
                return frame;
            }
        }
    }

    /// Frames already written by the client, without waiting.
    pub(crate) fn drain_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(text) = self.from_client.try_recv() {
            if let Some(frame) = stomp::decode_frame(&text).expect("decodable") {
                frames.push(frame);
            }
        }
        frames
    }

    pub(crate) fn push(&self, frame: &Frame) {
        self.to_client.send(stomp::encode_frame(frame)).expect("client alive");
    }

    pub(crate) fn push_raw(&self, text: &str) {
        self.to_client.send(text.to_owned()).expect("client alive");
    }

    pub(crate) fn accept(&self, heart_beat: &str) {
        self.push(
            &Frame::new(Command::Connected)
                .with_header("version", "1.2")
                .with_header("heart-beat", heart_beat),
        );
    }

    /// Answer CONNECT (heart-beats off) and collect the two SUBSCRIBE frames.
    pub(crate) async fn handshake(&mut self) -> Vec<Frame> {
        let connect = self.expect_frame().await;
        assert_eq!(connect.command, Command::Connect);
        self.accept("0,0");
        vec![self.expect_frame().await, self.expect_frame().await]
    }
}

struct FakeLink {
    to_server: mpsc::UnboundedSender<String>,
    from_server: mpsc::UnboundedReceiver<String>,
}

#[async_trait::async_trait]
impl Link for FakeLink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.to_server.send(text).map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        self.from_server.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.from_server.close();
    }
}

/// Hands every accepted socket's server half to the test.
pub(crate) struct FakeConnector {
    opens: AtomicUsize,
    refuse: AtomicUsize,
    accepted: mpsc::UnboundedSender<ServerSide>,
}

impl FakeConnector {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerSide>) {
        let (accepted, rx) = mpsc::unbounded_channel();
        let connector = Self { opens: AtomicUsize::new(0), refuse: AtomicUsize::new(0), accepted };
        (Arc::new(connector), rx)
    }

    /// Fail the next `n` open attempts.
    pub(crate) fn refuse_next(&self, n: usize) {
        self.refuse.store(n, Ordering::SeqCst);
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Connector for FakeConnector {
    async fn open(&self, _url: &str) -> Result<Box<dyn Link>, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportError::Closed);
        }
        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, from_server) = mpsc::unbounded_channel();
        let _ = self.accepted.send(ServerSide { from_client, to_client });
        Ok(Box::new(FakeLink { to_server, from_server }))
    }
}
