//! WebSocket transport over tokio-tungstenite

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::borrow::Cow;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use super::{Connector, Frame, Transport};
use crate::error::GatewayResult;

/// Connects over ws:// or wss://
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> GatewayResult<Box<dyn Transport>> {
        let (stream, response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        tracing::debug!(host = ?url.host_str(), status = %response.status(), "WebSocket connected");
        Ok(Box::new(WsTransport { stream }))
    }
}

/// An open WebSocket
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> GatewayResult<()> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<GatewayResult<Frame>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };

            match message {
                Message::Text(text) => return Some(Ok(Frame::Text(text))),
                Message::Binary(bytes) => return Some(Ok(Frame::Binary(bytes))),
                Message::Close(frame) => {
                    return Some(Ok(Frame::Close(frame.map(|f| u16::from(f.code)))));
                }
                // Pongs are answered by tungstenite
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    tracing::trace!("Control frame received");
                }
            }
        }
    }

    async fn close(&mut self, code: u16) -> GatewayResult<()> {
        let frame = CloseFrame {
            code: WsCloseCode::from(code),
            reason: Cow::Borrowed(""),
        };
        self.stream.close(Some(frame)).await?;
        Ok(())
    }
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport").finish_non_exhaustive()
    }
}
