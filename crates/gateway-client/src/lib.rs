//! # gateway-client
//!
//! Session engine for the real-time gateway: a streaming zlib decompressor,
//! heartbeat and zombie detection, identify/resume handshakes, reconnect with
//! backoff, and a connection task driven through [`GatewayClient`].

pub mod client;
pub mod compression;
pub mod error;
pub mod events;
pub mod handshake;
pub mod heartbeat;
pub mod session;
pub mod transport;

pub use client::{GatewayClient, GatewayOptions};
pub use compression::Decompressor;
pub use error::{GatewayError, GatewayResult};
pub use events::{ClientEvent, ClientStatus};
pub use session::{ConnectionState, Session};
pub use transport::{Connector, Frame, GatewayEndpoint, Transport, WsConnector};
