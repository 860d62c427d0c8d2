//! Connection-owning task
//!
//! One task owns the transport, the decompressor and the session machine.
//! Commands, frames and timers are multiplexed with `select!` so the machine
//! only ever sees one input at a time.
//!
//! Events wait in an ordered backlog until the consumer has room. The loop
//! never blocks on the consumer, so heartbeats and close requests keep
//! flowing while it catches up.

use gateway_core::{CloseCode, Credential, GatewayPayload, PresencePayload};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::{SendError, TrySendError};
use tokio::sync::mpsc::{self, OwnedPermit};
use tokio::sync::watch;
use tokio::time::Instant;
use url::Url;

use crate::compression::Decompressor;
use crate::error::{GatewayError, GatewayResult};
use crate::events::{ClientEvent, ClientStatus};
use crate::session::{Effect, SessionInput, SessionMachine};
use crate::transport::{Connector, Frame, Transport};

/// Stand-in deadline for a timer that is not armed
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Upper bound on sending a close frame to a peer that stopped reading
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

type PendingConnect = Pin<Box<dyn Future<Output = GatewayResult<Box<dyn Transport>>> + Send>>;

/// Requests from the handle
#[derive(Debug)]
pub(crate) enum Command {
    Start(Credential),
    Close(u16),
    UpdatePresence(PresencePayload),
    Shutdown,
}

/// What woke the loop
enum Wake {
    Command(Option<Command>),
    EventSlot(Result<OwnedPermit<ClientEvent>, SendError<()>>),
    Connected(GatewayResult<Box<dyn Transport>>),
    Frame(Option<GatewayResult<Frame>>),
    HeartbeatDue,
    ReconnectDue,
}

pub(crate) struct Runner {
    machine: SessionMachine,
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
    compressed: bool,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<ClientEvent>,
    status: watch::Sender<ClientStatus>,
    transport: Option<Box<dyn Transport>>,
    pending_connect: Option<PendingConnect>,
    decompressor: Option<Decompressor>,
    heartbeat_at: Option<Instant>,
    reconnect_at: Option<Instant>,
    queue: VecDeque<SessionInput>,
    backlog: VecDeque<ClientEvent>,
    consumer_gone: bool,
}

impl Runner {
    pub(crate) fn new(
        machine: SessionMachine,
        connector: Arc<dyn Connector>,
        connect_timeout: Duration,
        compressed: bool,
        commands: mpsc::Receiver<Command>,
        events: mpsc::Sender<ClientEvent>,
        status: watch::Sender<ClientStatus>,
    ) -> Self {
        Self {
            machine,
            connector,
            connect_timeout,
            compressed,
            commands,
            events,
            status,
            transport: None,
            pending_connect: None,
            decompressor: None,
            heartbeat_at: None,
            reconnect_at: None,
            queue: VecDeque::new(),
            backlog: VecDeque::new(),
            consumer_gone: false,
        }
    }

    pub(crate) async fn run(mut self) {
        tracing::debug!("Gateway client task started");

        loop {
            self.drain().await;

            let far_future = Instant::now() + FAR_FUTURE;
            let heartbeat_at = self.heartbeat_at.unwrap_or(far_future);
            let reconnect_at = self.reconnect_at.unwrap_or(far_future);

            let wake = tokio::select! {
                biased;

                command = self.commands.recv() => Wake::Command(command),

                () = tokio::time::sleep_until(heartbeat_at), if self.heartbeat_at.is_some() => {
                    Wake::HeartbeatDue
                }

                () = tokio::time::sleep_until(reconnect_at), if self.reconnect_at.is_some() => {
                    Wake::ReconnectDue
                }

                permit = self.events.clone().reserve_owned(), if !self.backlog.is_empty() => {
                    Wake::EventSlot(permit)
                }

                result = poll_connect(&mut self.pending_connect) => Wake::Connected(result),

                frame = recv_frame(&mut self.transport) => Wake::Frame(frame),
            };

            match wake {
                Wake::Command(Some(Command::Start(credential))) => {
                    self.queue.push_back(SessionInput::Start(credential));
                }
                Wake::Command(Some(Command::Close(code))) => {
                    self.queue.push_back(SessionInput::Close { code });
                }
                Wake::Command(Some(Command::UpdatePresence(presence))) => {
                    self.queue.push_back(SessionInput::UpdatePresence(presence));
                }
                Wake::Command(Some(Command::Shutdown) | None) => break,
                Wake::EventSlot(Ok(permit)) => {
                    if let Some(event) = self.backlog.pop_front() {
                        drop(permit.send(event));
                    }
                }
                Wake::EventSlot(Err(_)) => self.consumer_dropped(),
                Wake::Connected(result) => {
                    self.pending_connect = None;
                    let input = self.on_connected(result);
                    self.queue.push_back(input);
                }
                Wake::Frame(frame) => {
                    if let Some(input) = self.on_frame(frame) {
                        self.queue.push_back(input);
                    }
                }
                Wake::HeartbeatDue => {
                    self.heartbeat_at = None;
                    self.queue.push_back(SessionInput::HeartbeatTick);
                }
                Wake::ReconnectDue => {
                    self.reconnect_at = None;
                    self.queue.push_back(SessionInput::BackoffElapsed);
                }
            }
        }

        self.shutdown().await;
        tracing::debug!("Gateway client task stopped");
    }

    /// Feed queued inputs to the machine until nothing follows from them
    async fn drain(&mut self) {
        while let Some(input) = self.queue.pop_front() {
            let effects = self.machine.handle(input, Instant::now());
            for effect in effects {
                self.execute(effect).await;
            }
        }
        self.publish_status();
    }

    async fn shutdown(&mut self) {
        self.queue.push_back(SessionInput::Close {
            code: CloseCode::NORMAL,
        });
        self.drain().await;

        // Anything the machine did not already release
        self.pending_connect = None;
        self.decompressor = None;
        if let Some(mut transport) = self.transport.take() {
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, transport.close(CloseCode::NORMAL)).await;
        }

        let events = &self.events;
        let backlog = &mut self.backlog;
        let flushed = tokio::time::timeout(CLOSE_TIMEOUT, async {
            while let Some(event) = backlog.pop_front() {
                if events.send(event).await.is_err() {
                    break;
                }
            }
        })
        .await;
        if flushed.is_err() || !self.backlog.is_empty() {
            tracing::debug!(dropped = self.backlog.len(), "Undelivered events dropped on shutdown");
        }
    }

    async fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Connect { url } => self.begin_connect(url),
            Effect::Send(payload) => self.send(&payload).await,
            Effect::Disconnect { code } => {
                self.pending_connect = None;
                self.decompressor = None;
                if let Some(mut transport) = self.transport.take() {
                    match tokio::time::timeout(CLOSE_TIMEOUT, transport.close(code)).await {
                        Ok(Ok(())) => tracing::debug!(close_code = code, "Close frame sent"),
                        Ok(Err(e)) => {
                            tracing::debug!(close_code = code, error = %e, "Close frame not sent");
                        }
                        Err(_) => tracing::debug!(close_code = code, "Close frame timed out"),
                    }
                }
                self.queue
                    .push_back(SessionInput::TransportClosed { code: Some(code) });
            }
            Effect::ScheduleHeartbeat(delay) => self.heartbeat_at = Some(Instant::now() + delay),
            Effect::CancelHeartbeat => self.heartbeat_at = None,
            Effect::ScheduleReconnect(delay) => self.reconnect_at = Some(Instant::now() + delay),
            Effect::CancelReconnect => self.reconnect_at = None,
            Effect::Emit(event) => self.emit(event),
        }
    }

    /// Hand an event to the consumer, or queue it behind earlier ones
    fn emit(&mut self, event: ClientEvent) {
        if self.consumer_gone {
            return;
        }

        if self.backlog.is_empty() {
            match self.events.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Full(event)) => self.backlog.push_back(event),
                Err(TrySendError::Closed(_)) => {
                    self.consumer_dropped();
                    return;
                }
            }
        } else {
            self.backlog.push_back(event);
        }

        if self.backlog.len() % self.events.max_capacity().max(1) == 0 {
            tracing::warn!(backlog = self.backlog.len(), "Event consumer is falling behind");
        }
    }

    fn consumer_dropped(&mut self) {
        tracing::trace!(dropped = self.backlog.len(), "Event receiver dropped");
        self.backlog.clear();
        self.consumer_gone = true;
    }

    fn begin_connect(&mut self, url: Url) {
        // A new attempt never inherits the previous connection
        self.transport = None;
        self.decompressor = None;

        let connector = Arc::clone(&self.connector);
        let timeout = self.connect_timeout;
        self.pending_connect = Some(Box::pin(async move {
            match tokio::time::timeout(timeout, connector.connect(&url)).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::ConnectTimeout(timeout)),
            }
        }));
    }

    fn on_connected(&mut self, result: GatewayResult<Box<dyn Transport>>) -> SessionInput {
        match result {
            Ok(transport) => {
                self.transport = Some(transport);
                self.decompressor = self.compressed.then(Decompressor::new);
                SessionInput::TransportOpened
            }
            Err(e) => SessionInput::TransportFailed(e.to_string()),
        }
    }

    async fn send(&mut self, payload: &GatewayPayload) {
        let Some(transport) = self.transport.as_mut() else {
            tracing::debug!(op = %payload.op, "No open transport, payload dropped");
            return;
        };

        let text = match payload.to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(op = %payload.op, error = %e, "Failed to encode payload");
                return;
            }
        };

        if let Err(e) = transport.send_text(text).await {
            tracing::warn!(op = %payload.op, error = %e, "Failed to send payload");
            let input = self.lose_transport(None);
            self.queue.push_back(input);
        }
    }

    fn on_frame(&mut self, frame: Option<GatewayResult<Frame>>) -> Option<SessionInput> {
        match frame {
            None => Some(self.lose_transport(None)),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Transport error");
                Some(self.lose_transport(None))
            }
            Some(Ok(Frame::Close(code))) => {
                tracing::debug!(close_code = ?code, "Peer closed the connection");
                Some(self.lose_transport(code))
            }
            Some(Ok(Frame::Text(text))) => Some(decode(&text)),
            Some(Ok(Frame::Binary(bytes))) => match self.decompressor.as_mut() {
                Some(decompressor) => match decompressor.push(&bytes) {
                    Ok(text) => text.map(|text| decode(&text)),
                    Err(e) => Some(SessionInput::ProtocolViolation(e.to_string())),
                },
                None => match String::from_utf8(bytes) {
                    Ok(text) => Some(decode(&text)),
                    Err(_) => Some(SessionInput::Malformed(
                        "Binary frame on an uncompressed connection".to_string(),
                    )),
                },
            },
        }
    }

    fn lose_transport(&mut self, code: Option<u16>) -> SessionInput {
        self.transport = None;
        self.decompressor = None;
        SessionInput::TransportClosed { code }
    }

    fn publish_status(&self) {
        let status = self.machine.status();
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

fn decode(text: &str) -> SessionInput {
    match GatewayPayload::from_json(text) {
        Ok(payload) => SessionInput::Payload(payload),
        Err(e) => SessionInput::Malformed(e.to_string()),
    }
}

/// Resolves with the pending connect attempt; never resolves if there is none
async fn poll_connect(pending: &mut Option<PendingConnect>) -> GatewayResult<Box<dyn Transport>> {
    match pending {
        Some(connect) => connect.await,
        None => std::future::pending().await,
    }
}

/// Next frame from the open transport; never resolves if there is none
async fn recv_frame(transport: &mut Option<Box<dyn Transport>>) -> Option<GatewayResult<Frame>> {
    match transport {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}
