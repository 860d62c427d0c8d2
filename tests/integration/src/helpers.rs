//! Test helpers for integration tests
//!
//! `FakeGateway` accepts WebSocket connections on an ephemeral localhost
//! port and hands each one to the test as a `GatewayPeer`, which the test
//! drives by hand.

use std::borrow::Cow;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use flate2::{Compress, Compression, FlushCompress};
use futures_util::{SinkExt, StreamExt};
use gateway_client::ClientEvent;
use gateway_core::{GatewayPayload, OpCode};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// How long any single step may take before the test fails
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// In-process gateway server
pub struct FakeGateway {
    /// `ws://` URL the client should connect to
    pub url: String,
    peers: mpsc::UnboundedReceiver<GatewayPeer>,
    _handle: JoinHandle<()>,
}

impl FakeGateway {
    /// Bind an ephemeral port and start accepting
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, peers) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                match GatewayPeer::handshake(stream).await {
                    Ok(peer) => {
                        if tx.send(peer).is_err() {
                            break;
                        }
                    }
                    Err(e) => eprintln!("Fake gateway handshake failed: {e}"),
                }
            }
        });

        Ok(Self {
            url: format!("ws://{addr}"),
            peers,
            _handle: handle,
        })
    }

    /// Next client connection
    pub async fn accept(&mut self) -> Result<GatewayPeer> {
        tokio::time::timeout(STEP_TIMEOUT, self.peers.recv())
            .await
            .context("No client connected")?
            .ok_or_else(|| anyhow!("Fake gateway stopped"))
    }

    /// Whether a client connects within the given window
    pub async fn connects_within(&mut self, window: Duration) -> bool {
        matches!(
            tokio::time::timeout(window, self.peers.recv()).await,
            Ok(Some(_))
        )
    }
}

/// What the client sent
#[derive(Debug)]
pub enum Inbound {
    Payload(GatewayPayload),
    Closed(Option<u16>),
}

/// Server side of one client connection
pub struct GatewayPeer {
    /// Request path and query the client connected with
    pub request_uri: String,
    ws: WebSocketStream<TcpStream>,
    compressor: Option<Compress>,
}

impl GatewayPeer {
    async fn handshake(stream: TcpStream) -> Result<Self> {
        let mut request_uri = String::new();
        let ws = tokio_tungstenite::accept_hdr_async(
            stream,
            |req: &Request, res: Response| -> Result<Response, ErrorResponse> {
                request_uri = req.uri().to_string();
                Ok(res)
            },
        )
        .await?;

        let compressor = request_uri
            .contains("compress=zlib-stream")
            .then(|| Compress::new(Compression::default(), true));

        Ok(Self {
            request_uri,
            ws,
            compressor,
        })
    }

    /// Whether this connection negotiated zlib-stream compression
    pub fn is_compressed(&self) -> bool {
        self.compressor.is_some()
    }

    /// Send one payload as a single frame
    pub async fn send(&mut self, payload: &GatewayPayload) -> Result<()> {
        let text = payload.to_json()?;
        let message = match self.compressor.as_mut() {
            Some(compressor) => Message::Binary(compress_unit(compressor, &text)?),
            None => Message::Text(text),
        };
        self.ws.send(message).await?;
        Ok(())
    }

    /// Send one compressed payload split across `parts` binary frames
    pub async fn send_split(&mut self, payload: &GatewayPayload, parts: usize) -> Result<()> {
        let Some(compressor) = self.compressor.as_mut() else {
            bail!("Connection is not compressed");
        };
        let unit = compress_unit(compressor, &payload.to_json()?)?;
        let size = unit.len().div_ceil(parts.max(1));

        for chunk in unit.chunks(size) {
            self.ws.send(Message::Binary(chunk.to_vec())).await?;
        }
        Ok(())
    }

    pub async fn hello(&mut self, heartbeat_interval_ms: u64) -> Result<()> {
        self.send(&GatewayPayload::hello(heartbeat_interval_ms)).await
    }

    /// Next payload or close from the client
    pub async fn recv(&mut self) -> Result<Inbound> {
        loop {
            let message = tokio::time::timeout(STEP_TIMEOUT, self.ws.next())
                .await
                .context("Client sent nothing")?;

            match message {
                None => return Ok(Inbound::Closed(None)),
                Some(Err(e)) => bail!("WebSocket error: {e}"),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Inbound::Payload(GatewayPayload::from_json(&text)?));
                }
                Some(Ok(Message::Close(frame))) => {
                    return Ok(Inbound::Closed(frame.map(|f| u16::from(f.code))));
                }
                Some(Ok(_)) => {}
            }
        }
    }

    /// Next payload with the given op; heartbeats on the way are acknowledged
    pub async fn expect(&mut self, op: OpCode) -> Result<GatewayPayload> {
        loop {
            match self.recv().await? {
                Inbound::Payload(payload) if payload.op == op => return Ok(payload),
                Inbound::Payload(payload) if payload.op == OpCode::Heartbeat => {
                    self.send(&GatewayPayload::heartbeat_ack()).await?;
                }
                Inbound::Payload(payload) => bail!("Expected {op}, got {payload}"),
                Inbound::Closed(code) => bail!("Client closed with {code:?} while waiting for {op}"),
            }
        }
    }

    /// Wait for the client's close frame, skipping heartbeats
    pub async fn expect_close(&mut self) -> Result<Option<u16>> {
        loop {
            match self.recv().await? {
                Inbound::Closed(code) => return Ok(code),
                Inbound::Payload(payload) if payload.op == OpCode::Heartbeat => {}
                Inbound::Payload(payload) => bail!("Expected close, got {payload}"),
            }
        }
    }

    /// Close the connection with a gateway close code
    pub async fn close(&mut self, code: u16) -> Result<()> {
        let frame = CloseFrame {
            code: WsCloseCode::from(code),
            reason: Cow::Borrowed(""),
        };
        self.ws.close(Some(frame)).await?;
        Ok(())
    }
}

/// Compress one payload as a sync-flushed unit of the connection's stream
fn compress_unit(compressor: &mut Compress, text: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() * 2 + 64);
    compressor.compress_vec(text.as_bytes(), &mut out, FlushCompress::Sync)?;
    Ok(out)
}

/// Next client event, failing the test if none arrives in time
pub async fn next_event(events: &mut mpsc::Receiver<ClientEvent>) -> Result<ClientEvent> {
    tokio::time::timeout(STEP_TIMEOUT, events.recv())
        .await
        .context("No client event")?
        .ok_or_else(|| anyhow!("Event channel closed"))
}

/// Next event that is not a dispatch
pub async fn next_lifecycle(events: &mut mpsc::Receiver<ClientEvent>) -> Result<ClientEvent> {
    loop {
        match next_event(events).await? {
            ClientEvent::Dispatch(_) => {}
            other => return Ok(other),
        }
    }
}
