//! Session state machine
//!
//! `handle(input, now)` updates the state and returns the effects to carry
//! out. The machine performs no I/O; the runner executes its effects and
//! feeds back what happened.

use gateway_common::ReconnectConfig;
use gateway_core::{
    CloseCode, CloseDisposition, Credential, DispatchEvent, GatewayEventType, GatewayPayload,
    OpCode, PresencePayload,
};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use super::{Backoff, ConnectionState, HandshakeKind, Session};
use crate::events::{ClientEvent, ClientStatus};
use crate::handshake;
use crate::heartbeat::{HeartbeatController, HeartbeatSignal};
use crate::transport::GatewayEndpoint;

/// Consecutive malformed payloads tolerated before the connection is recycled
pub const MALFORMED_LIMIT: u32 = 5;

/// Something that happened
#[derive(Debug, Clone)]
pub enum SessionInput {
    /// Caller asked to connect
    Start(Credential),
    /// The transport requested by `Effect::Connect` is open
    TransportOpened,
    /// The transport requested by `Effect::Connect` could not be opened
    TransportFailed(String),
    /// The open transport is gone, with the close code if one is known
    TransportClosed { code: Option<u16> },
    /// A decoded payload
    Payload(GatewayPayload),
    /// A frame that could not be decoded into a payload
    Malformed(String),
    /// The connection's byte stream can no longer be decoded at all
    ProtocolViolation(String),
    /// Heartbeat timer fired
    HeartbeatTick,
    /// Reconnect timer fired
    BackoffElapsed,
    /// Caller asked to close
    Close { code: u16 },
    /// Caller asked to change presence
    UpdatePresence(PresencePayload),
}

/// Something to do
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open a transport to this URL
    Connect { url: Url },
    /// Send a payload on the open transport
    Send(GatewayPayload),
    /// Close the transport (or abandon the pending connect), then report
    /// `TransportClosed` with this code
    Disconnect { code: u16 },
    /// (Re)arm the heartbeat timer
    ScheduleHeartbeat(Duration),
    CancelHeartbeat,
    /// Arm the reconnect timer
    ScheduleReconnect(Duration),
    CancelReconnect,
    /// Deliver to the consumer
    Emit(ClientEvent),
}

pub struct SessionMachine {
    state: ConnectionState,
    session: Session,
    credential: Option<Credential>,
    endpoint: GatewayEndpoint,
    heartbeat: HeartbeatController,
    backoff: Backoff,
    max_reconnect_attempts: Option<u32>,
    malformed_streak: u32,
}

impl SessionMachine {
    #[must_use]
    pub fn new(endpoint: GatewayEndpoint, reconnect: &ReconnectConfig) -> Self {
        Self::with_parts(
            endpoint,
            Backoff::new(reconnect),
            HeartbeatController::new(),
            reconnect.max_attempts,
        )
    }

    #[must_use]
    pub fn with_parts(
        endpoint: GatewayEndpoint,
        backoff: Backoff,
        heartbeat: HeartbeatController,
        max_reconnect_attempts: Option<u32>,
    ) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            session: Session::default(),
            credential: None,
            endpoint,
            heartbeat,
            backoff,
            max_reconnect_attempts,
            malformed_streak: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn status(&self) -> ClientStatus {
        ClientStatus {
            state: self.state,
            session_id: self.session.id.clone(),
            sequence: self.session.sequence,
            latency: self.heartbeat.latency(),
        }
    }

    /// Apply one input
    pub fn handle(&mut self, input: SessionInput, now: Instant) -> Vec<Effect> {
        let before = self.state;

        let effects = match input {
            SessionInput::Start(credential) => self.on_start(credential),
            SessionInput::TransportOpened => self.on_opened(),
            SessionInput::TransportFailed(reason) => self.on_connect_failed(&reason),
            SessionInput::TransportClosed { code } => self.on_closed(code),
            SessionInput::Payload(payload) => self.on_payload(payload, now),
            SessionInput::Malformed(reason) => self.on_malformed(&reason),
            SessionInput::ProtocolViolation(reason) => self.on_protocol_violation(&reason),
            SessionInput::HeartbeatTick => self.on_heartbeat_tick(now),
            SessionInput::BackoffElapsed => self.on_backoff_elapsed(),
            SessionInput::Close { code } => self.on_close(code),
            SessionInput::UpdatePresence(presence) => self.on_update_presence(&presence),
        };

        if self.state != before {
            tracing::debug!(from = %before, to = %self.state, "Session state changed");
        }
        effects
    }

    // === Caller requests ===

    fn on_start(&mut self, credential: Credential) -> Vec<Effect> {
        if self.state != ConnectionState::Disconnected {
            tracing::debug!(state = %self.state, "Start ignored, session already running");
            return Vec::new();
        }
        if !credential.is_usable() {
            return vec![Effect::Emit(ClientEvent::Error(
                "Cannot start without a credential".to_string(),
            ))];
        }

        self.credential = Some(credential);
        self.backoff.reset();
        self.connect()
    }

    fn on_close(&mut self, code: u16) -> Vec<Effect> {
        if matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Closing
        ) {
            tracing::debug!(state = %self.state, "Close ignored, nothing to close");
            return Vec::new();
        }

        // The server drops the session on a normal closure
        if code == CloseCode::NORMAL || code == CloseCode::GOING_AWAY {
            self.session.clear();
        }

        tracing::info!(close_code = code, "Closing gateway session");
        self.begin_close(code)
    }

    fn on_update_presence(&mut self, presence: &PresencePayload) -> Vec<Effect> {
        if self.state != ConnectionState::Established {
            tracing::warn!(state = %self.state, "Presence update ignored, session not established");
            return Vec::new();
        }

        match GatewayPayload::presence_update(presence) {
            Ok(payload) => vec![Effect::Send(payload)],
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode presence update");
                Vec::new()
            }
        }
    }

    // === Transport lifecycle ===

    fn connect(&mut self) -> Vec<Effect> {
        self.state = ConnectionState::Connecting;
        self.malformed_streak = 0;

        let resuming = self.session.is_resumable();
        let url = if resuming {
            self.endpoint.resume_url(self.session.resume_url.as_deref())
        } else {
            self.endpoint.url()
        };

        tracing::info!(host = ?url.host_str(), resuming, "Connecting to gateway");
        vec![Effect::Connect { url }]
    }

    fn on_opened(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::Connecting {
            tracing::trace!(state = %self.state, "Stale transport open ignored");
            return Vec::new();
        }

        self.state = ConnectionState::AwaitingHello;
        self.heartbeat.arm();
        vec![Effect::Emit(ClientEvent::Connected)]
    }

    fn on_connect_failed(&mut self, reason: &str) -> Vec<Effect> {
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }

        tracing::warn!(error = reason, "Gateway connection failed");
        self.schedule_reconnect()
    }

    fn on_closed(&mut self, code: Option<u16>) -> Vec<Effect> {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Reconnecting { .. } => {
                tracing::trace!(close_code = ?code, "Close for a connection already gone");
                Vec::new()
            }
            ConnectionState::Closing => {
                tracing::info!(close_code = ?code, "Gateway session closed");
                self.state = ConnectionState::Disconnected;
                vec![Effect::Emit(ClientEvent::Closed)]
            }
            ConnectionState::Connecting
            | ConnectionState::AwaitingHello
            | ConnectionState::Handshaking(_)
            | ConnectionState::Established => self.on_connection_lost(code),
        }
    }

    fn on_connection_lost(&mut self, code: Option<u16>) -> Vec<Effect> {
        let mut effects = self.teardown();
        let disposition = code.map_or(CloseDisposition::Resume, CloseCode::classify);

        match disposition {
            CloseDisposition::Resume => {
                let resumable = self.session.is_resumable();
                tracing::info!(close_code = ?code, resumable, "Gateway connection lost");
                effects.push(Effect::Emit(ClientEvent::Disconnected { code, resumable }));
                effects.extend(self.schedule_reconnect());
            }
            CloseDisposition::Reidentify => {
                tracing::warn!(
                    close_code = ?code,
                    session_id = ?self.session.id,
                    "Gateway rejected the session, identifying again"
                );
                self.session.clear();
                effects.push(Effect::Emit(ClientEvent::Disconnected {
                    code,
                    resumable: false,
                }));
                effects.push(Effect::Emit(ClientEvent::SessionInvalidated));
                effects.extend(self.schedule_reconnect());
            }
            CloseDisposition::Fatal => {
                let reason = code
                    .and_then(CloseCode::from_u16)
                    .map_or("unknown", CloseCode::description);
                tracing::error!(close_code = ?code, reason, "Gateway closed the session permanently");
                self.session.clear();
                self.state = ConnectionState::Disconnected;
                effects.push(Effect::Emit(ClientEvent::Disconnected {
                    code,
                    resumable: false,
                }));
                effects.push(Effect::Emit(ClientEvent::Error(format!(
                    "Gateway closed the session: {reason}"
                ))));
            }
        }

        effects
    }

    fn on_backoff_elapsed(&mut self) -> Vec<Effect> {
        match self.state {
            ConnectionState::Reconnecting { .. } => self.connect(),
            _ => Vec::new(),
        }
    }

    fn schedule_reconnect(&mut self) -> Vec<Effect> {
        if let Some(max) = self.max_reconnect_attempts {
            if self.backoff.attempts() >= max {
                tracing::error!(attempts = max, "Giving up on reconnecting");
                self.state = ConnectionState::Disconnected;
                return vec![Effect::Emit(ClientEvent::Error(format!(
                    "Gave up after {max} reconnect attempts"
                )))];
            }
        }

        let attempt = self.backoff.attempts().saturating_add(1);
        let delay = self.backoff.next_delay();
        self.state = ConnectionState::Reconnecting { attempt };

        tracing::info!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Reconnecting to gateway"
        );
        vec![
            Effect::ScheduleReconnect(delay),
            Effect::Emit(ClientEvent::Reconnecting { attempt, delay }),
        ]
    }

    /// Per-connection state goes; the session stays
    fn teardown(&mut self) -> Vec<Effect> {
        self.heartbeat.reset();
        self.malformed_streak = 0;
        vec![Effect::CancelHeartbeat]
    }

    /// Recycle the connection, keeping the session resumable on the server
    fn drop_connection(&mut self) -> Vec<Effect> {
        self.heartbeat.reset();
        vec![
            Effect::CancelHeartbeat,
            Effect::Disconnect {
                code: CloseCode::RESUMABLE,
            },
        ]
    }

    fn begin_close(&mut self, code: u16) -> Vec<Effect> {
        self.state = ConnectionState::Closing;
        self.heartbeat.reset();
        self.malformed_streak = 0;
        vec![
            Effect::CancelHeartbeat,
            Effect::CancelReconnect,
            Effect::Disconnect { code },
        ]
    }

    // === Inbound payloads ===

    fn on_payload(&mut self, payload: GatewayPayload, now: Instant) -> Vec<Effect> {
        if !self.state.is_connected() {
            tracing::trace!(op = %payload.op, state = %self.state, "Payload outside a live connection dropped");
            return Vec::new();
        }
        if !payload.is_valid_server_message() {
            return self.on_malformed(&format!("op {} is not sent by the gateway", payload.op));
        }

        self.malformed_streak = 0;
        tracing::trace!(op = %payload.op, seq = ?payload.s, "Payload received");

        match payload.op {
            OpCode::Hello => self.on_hello(&payload),
            OpCode::HeartbeatAck => {
                self.heartbeat.on_ack(now);
                Vec::new()
            }
            OpCode::Heartbeat => {
                vec![Effect::Send(
                    self.heartbeat.beat_now(self.session.sequence, now),
                )]
            }
            OpCode::Reconnect => {
                tracing::info!("Gateway requested a reconnect");
                self.drop_connection()
            }
            OpCode::InvalidSession => self.on_invalid_session(&payload),
            OpCode::Dispatch => self.on_dispatch(payload),
            // Client-only ops were rejected above
            OpCode::Identify | OpCode::PresenceUpdate | OpCode::Resume => Vec::new(),
        }
    }

    fn on_hello(&mut self, payload: &GatewayPayload) -> Vec<Effect> {
        if self.state != ConnectionState::AwaitingHello {
            tracing::warn!(state = %self.state, "Unexpected Hello ignored");
            return Vec::new();
        }

        let hello = match payload.as_hello() {
            Ok(hello) if hello.heartbeat_interval > 0 => hello,
            Ok(_) => return self.on_malformed("Hello with a zero heartbeat interval"),
            Err(e) => return self.on_malformed(&e.to_string()),
        };

        let credential = self.credential.as_ref();
        let handshake = if self.session.is_resumable() {
            handshake::resume(credential, &self.session)
                .map(|body| (HandshakeKind::Resume, GatewayPayload::resume(&body)))
        } else {
            handshake::identify(credential)
                .map(|body| (HandshakeKind::Identify, GatewayPayload::identify(&body)))
        };

        let (kind, message) = match handshake {
            Some((kind, Ok(message))) => (kind, message),
            Some((_, Err(e))) => {
                return self.handshake_failed(&format!("Failed to encode handshake: {e}"));
            }
            None => return self.handshake_failed("No credential available"),
        };

        let first_beat = self
            .heartbeat
            .on_hello(Duration::from_millis(hello.heartbeat_interval));
        tracing::debug!(
            ?kind,
            heartbeat_interval_ms = hello.heartbeat_interval,
            session_id = ?self.session.id,
            seq = ?self.session.sequence,
            "Sending handshake"
        );
        self.state = ConnectionState::Handshaking(kind);
        vec![Effect::ScheduleHeartbeat(first_beat), Effect::Send(message)]
    }

    /// No handshake can be sent on this connection; recycle it and retry after backoff
    fn handshake_failed(&mut self, reason: &str) -> Vec<Effect> {
        tracing::error!(error = reason, "Cannot send handshake");
        let mut effects = vec![Effect::Emit(ClientEvent::Error(reason.to_string()))];
        effects.extend(self.drop_connection());
        effects
    }

    fn on_invalid_session(&mut self, payload: &GatewayPayload) -> Vec<Effect> {
        let mut effects = Vec::new();

        if payload.is_resumable_invalidation() {
            tracing::info!(session_id = ?self.session.id, "Session invalidated, resume allowed");
        } else {
            tracing::warn!(session_id = ?self.session.id, "Session invalidated by gateway");
            self.session.clear();
            effects.push(Effect::Emit(ClientEvent::SessionInvalidated));
        }

        effects.extend(self.drop_connection());
        effects
    }

    fn on_dispatch(&mut self, payload: GatewayPayload) -> Vec<Effect> {
        // Cursor first, so anything reacting to the event sees it
        if let Some(seq) = payload.s {
            self.session.advance(seq);
        }

        let is_ready = payload.t.as_deref() == Some(GatewayEventType::Ready.as_str());
        let mut effects = Vec::new();

        match self.state {
            ConnectionState::Handshaking(HandshakeKind::Identify) if is_ready => {
                match payload.as_ready() {
                    Ok(ready) => {
                        tracing::info!(session_id = %ready.session_id, "Session ready");
                        self.session
                            .establish(ready.session_id.clone(), ready.resume_gateway_url);
                        self.established();
                        effects.push(Effect::Emit(ClientEvent::Ready {
                            session_id: ready.session_id,
                        }));
                    }
                    Err(e) => tracing::warn!(error = %e, "READY without a usable session"),
                }
            }
            ConnectionState::Handshaking(HandshakeKind::Resume) => {
                tracing::info!(
                    session_id = ?self.session.id,
                    seq = ?self.session.sequence,
                    "Session resumed"
                );
                self.established();
                effects.push(Effect::Emit(ClientEvent::Resumed));
            }
            _ => {}
        }

        match DispatchEvent::from_payload(payload) {
            Ok(event) => effects.push(Effect::Emit(ClientEvent::Dispatch(event))),
            Err(e) => tracing::warn!(error = %e, "Dropping undecodable dispatch"),
        }
        effects
    }

    fn established(&mut self) {
        self.state = ConnectionState::Established;
        self.backoff.reset();
    }

    fn on_malformed(&mut self, reason: &str) -> Vec<Effect> {
        if !self.state.is_connected() {
            return Vec::new();
        }

        self.malformed_streak += 1;
        tracing::warn!(error = reason, streak = self.malformed_streak, "Dropping malformed payload");

        if self.malformed_streak >= MALFORMED_LIMIT {
            tracing::warn!("Too many malformed payloads, recycling the connection");
            self.malformed_streak = 0;
            return self.drop_connection();
        }
        Vec::new()
    }

    fn on_protocol_violation(&mut self, reason: &str) -> Vec<Effect> {
        if !self.state.is_connected() {
            return Vec::new();
        }

        tracing::warn!(error = reason, "Stream unusable, recycling the connection");
        self.drop_connection()
    }

    // === Timers ===

    fn on_heartbeat_tick(&mut self, now: Instant) -> Vec<Effect> {
        if !self.state.is_connected() {
            return Vec::new();
        }

        match self.heartbeat.on_tick(self.session.sequence, now) {
            Some(HeartbeatSignal::Beat(payload)) => {
                tracing::trace!(seq = ?self.session.sequence, "Sending heartbeat");
                let mut effects = vec![Effect::Send(payload)];
                if let Some(interval) = self.heartbeat.interval() {
                    effects.push(Effect::ScheduleHeartbeat(interval));
                }
                effects
            }
            Some(HeartbeatSignal::Zombied) => {
                tracing::warn!(session_id = ?self.session.id, "Heartbeat not acknowledged, connection zombied");
                self.drop_connection()
            }
            None => Vec::new(),
        }
    }
}

impl std::fmt::Debug for SessionMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMachine")
            .field("state", &self.state)
            .field("session", &self.session)
            .field("heartbeat", &self.heartbeat)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}
