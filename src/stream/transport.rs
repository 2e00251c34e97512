//! Message-oriented transport to the research service.
//!
//! [`Connector`]/[`Transport`] are the seam between the client and the
//! socket library; tests plug in a scripted transport instead of a server.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::StreamError;

/// An open, message-oriented connection.
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame.
    async fn send(&mut self, frame: String) -> Result<(), StreamError>;

    /// Receive the next text frame. `None` once the peer has closed.
    async fn recv(&mut self) -> Option<Result<String, StreamError>>;

    /// Close the connection. Closing twice is a no-op.
    async fn close(&mut self) -> Result<(), StreamError>;
}

/// Opens a fresh [`Transport`] per query.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Transport>, StreamError>;
}

/// WebSocket connector for `ws://` and `wss://` URLs.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, StreamError> {
        tracing::info!(url = %self.url, "Connecting to research service");

        let connecting = connect_async(self.url.as_str());
        let (socket, response) = tokio::time::timeout(self.connect_timeout, connecting)
            .await
            .map_err(|_| {
                StreamError::ConnectionFailed(format!(
                    "timed out after {:?}",
                    self.connect_timeout
                ))
            })?
            .map_err(|e| StreamError::ConnectionFailed(e.to_string()))?;

        tracing::debug!(status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WsTransport::new(socket)))
    }
}

/// [`Transport`] over a tungstenite WebSocket.
pub struct WsTransport {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl WsTransport {
    pub fn new(socket: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self {
            socket,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, frame: String) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::ConnectionClosed);
        }
        self.socket
            .send(WsMessage::Text(frame))
            .await
            .map_err(|e| StreamError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, StreamError>> {
        if self.closed {
            return None;
        }
        loop {
            match self.socket.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(text)),
                Ok(WsMessage::Binary(bytes)) => {
                    return Some(
                        String::from_utf8(bytes)
                            .map_err(|e| StreamError::Malformed(e.to_string())),
                    )
                }
                Ok(WsMessage::Close(frame)) => {
                    tracing::debug!(?frame, "Research service closed the socket");
                    self.closed = true;
                    return None;
                }
                // Pings are answered by tungstenite on the next read/write.
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) | Ok(WsMessage::Frame(_)) => {
                    continue
                }
                Err(e) => return Some(Err(StreamError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.socket
            .close(None)
            .await
            .map_err(|e| StreamError::Transport(e.to_string()))
    }
}
