//! Transport seam
//!
//! The runner talks to the network only through these traits, so tests can
//! swap in an in-memory transport.

mod endpoint;
mod websocket;

use async_trait::async_trait;
use url::Url;

use crate::error::GatewayResult;

pub use endpoint::GatewayEndpoint;
pub use websocket::{WsConnector, WsTransport};

/// A frame received from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// Peer closed, with its close code if it sent one
    Close(Option<u16>),
}

/// One open physical connection
#[async_trait]
pub trait Transport: Send {
    /// Send a text frame
    async fn send_text(&mut self, text: String) -> GatewayResult<()>;

    /// Next data or close frame; `None` once the connection is gone
    ///
    /// Must be cancel-safe.
    async fn recv(&mut self) -> Option<GatewayResult<Frame>>;

    /// Send a close frame with the given code
    async fn close(&mut self, code: u16) -> GatewayResult<()>;
}

/// Opens transports
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> GatewayResult<Box<dyn Transport>>;
}
