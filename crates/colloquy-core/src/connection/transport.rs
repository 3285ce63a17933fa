//! Transport seam: the message-oriented channel the session task owns.
//!
//! The production implementation speaks WebSocket via `tokio-tungstenite`;
//! tests substitute a scripted fake behind the same traits.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::warn;

use colloquy_common::TransportError;

/// An event surfaced by an open link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A complete inbound text frame.
    Frame(String),
    /// The link terminated. `clean` is whether the peer completed a
    /// protocol-level close rather than dropping abruptly.
    Closed { clean: bool },
}

/// A single open bidirectional link.
#[async_trait]
pub trait TransportLink: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;
    async fn next_event(&mut self) -> LinkEvent;
    async fn close(&mut self);
}

/// Opens links against an endpoint URL.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn TransportLink>, TransportError>;
}

/// WebSocket transport.
pub struct WsTransport {
    open_timeout: Duration,
}

impl WsTransport {
    pub fn new(open_timeout: Duration) -> Self {
        Self { open_timeout }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str) -> Result<Box<dyn TransportLink>, TransportError> {
        match tokio::time::timeout(self.open_timeout, tokio_tungstenite::connect_async(url)).await
        {
            Ok(Ok((ws, _))) => Ok(Box::new(WsLink { ws })),
            Ok(Err(e)) => Err(TransportError::Connect(e.to_string())),
            Err(_elapsed) => Err(TransportError::Timeout(self.open_timeout.as_secs())),
        }
    }
}

struct WsLink {
    ws: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
}

#[async_trait]
impl TransportLink for WsLink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.ws
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn next_event(&mut self) -> LinkEvent {
        loop {
            match self.ws.next().await {
                Some(Ok(WsMessage::Text(text))) => return LinkEvent::Frame(text.to_string()),
                Some(Ok(WsMessage::Close(_))) => return LinkEvent::Closed { clean: true },
                // ping/pong are answered by tungstenite; binary is not part
                // of this protocol
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    return LinkEvent::Closed { clean: false };
                }
                None => return LinkEvent::Closed { clean: false },
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}
