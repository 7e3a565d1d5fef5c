//! Text-frame transport beneath the STOMP session.
//!
//! [`Connector`] and [`Link`] are the seam between the connection manager and
//! the socket. Production uses [`WsConnector`] (tokio-tungstenite); tests plug
//! in channel-backed fakes.

#[cfg(test)]
#[path = "transport_test.rs"]
mod transport_test;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The WebSocket handshake failed.
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    /// Reading or writing an open socket failed.
    #[error("websocket io failed: {0}")]
    Io(Box<tokio_tungstenite::tungstenite::Error>),
    /// The peer closed the socket.
    #[error("websocket closed")]
    Closed,
}

/// One open, bidirectional text channel.
#[async_trait::async_trait]
pub trait Link: Send {
    /// # Errors
    ///
    /// Returns an error when the frame cannot be written.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next text frame; `None` once the peer has closed. Cancel-safe.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Close politely. Errors are swallowed; the link is finished either way.
    async fn close(&mut self);
}

/// Opens [`Link`]s to an endpoint.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the endpoint cannot be reached or refuses the upgrade.
    async fn open(&self, url: &str) -> Result<Box<dyn Link>, TransportError>;
}

/// Plain WebSocket connector (no SockJS framing).
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Box<dyn Link>, TransportError> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(Box::new(e)))?;
        Ok(Box::new(WsLink { stream }))
    }
}

struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

#[async_trait::async_trait]
impl Link for WsLink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Io(Box::new(e)))
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(TransportError::Io(Box::new(e)))),
            };
            match msg {
                Message::Text(text) => return Some(Ok(text.as_str().to_owned())),
                Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => debug!(len = bytes.len(), "transport: skipping non-utf8 binary message"),
                },
                Message::Close(_) => return None,
                _ => {}
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "transport: close failed");
        }
    }
}

/// Host part of an endpoint URL, used for the STOMP `host` header. `None`
/// when the URL does not parse or has no host.
#[must_use]
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_owned)
}
