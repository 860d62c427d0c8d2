//! Gateway message format
//!
//! Defines the envelope every gateway message travels in.

use super::{HelloPayload, IdentifyPayload, OpCode, PresencePayload, ReadyPayload, ResumePayload};
use crate::error::ProtocolError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway message envelope
///
/// All messages in both directions follow this format. Every key is always
/// serialized, with `null` for absent values.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayload {
    /// Operation code
    pub op: OpCode,

    /// Event data payload
    #[serde(default)]
    pub d: Value,

    /// Sequence number (only for op=0 Dispatch)
    #[serde(default)]
    pub s: Option<u64>,

    /// Event name (only for op=0 Dispatch)
    #[serde(default)]
    pub t: Option<String>,
}

impl GatewayPayload {
    fn control(op: OpCode, d: Value) -> Self {
        Self { op, d, s: None, t: None }
    }

    fn encode<T: Serialize>(op: OpCode, data: &T) -> Result<Self, ProtocolError> {
        Ok(Self::control(op, serde_json::to_value(data)?))
    }

    // === Client Messages ===

    /// Create a Heartbeat message (op=1) carrying the last seen sequence
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::control(
            OpCode::Heartbeat,
            last_sequence.map_or(Value::Null, |s| Value::Number(s.into())),
        )
    }

    /// Create an Identify message (op=2)
    pub fn identify(payload: &IdentifyPayload) -> Result<Self, ProtocolError> {
        Self::encode(OpCode::Identify, payload)
    }

    /// Create a Presence Update message (op=3)
    pub fn presence_update(payload: &PresencePayload) -> Result<Self, ProtocolError> {
        Self::encode(OpCode::PresenceUpdate, payload)
    }

    /// Create a Resume message (op=6)
    pub fn resume(payload: &ResumePayload) -> Result<Self, ProtocolError> {
        Self::encode(OpCode::Resume, payload)
    }

    // === Server Messages ===

    /// Create a Dispatch message (op=0)
    #[must_use]
    pub fn dispatch(event_name: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d: data,
            s: Some(sequence),
            t: Some(event_name.into()),
        }
    }

    /// Create a Hello message (op=10)
    #[must_use]
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::control(
            OpCode::Hello,
            serde_json::json!({ "heartbeat_interval": heartbeat_interval }),
        )
    }

    /// Create a Heartbeat ACK message (op=11)
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::control(OpCode::HeartbeatAck, Value::Null)
    }

    /// Create a Reconnect message (op=7)
    #[must_use]
    pub fn reconnect() -> Self {
        Self::control(OpCode::Reconnect, Value::Null)
    }

    /// Create an Invalid Session message (op=9)
    ///
    /// `resumable` indicates if the session can be resumed.
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::control(OpCode::InvalidSession, Value::Bool(resumable))
    }

    // === Parsing ===

    fn data_as<T: DeserializeOwned>(&self, expected: OpCode) -> Result<T, ProtocolError> {
        if self.op != expected {
            return Err(ProtocolError::UnexpectedOpCode {
                expected,
                actual: self.op,
            });
        }
        if self.d.is_null() {
            return Err(ProtocolError::MissingData(expected));
        }
        Ok(T::deserialize(&self.d)?)
    }

    /// Parse the Hello payload (op=10)
    pub fn as_hello(&self) -> Result<HelloPayload, ProtocolError> {
        self.data_as(OpCode::Hello)
    }

    /// Parse the READY dispatch body
    pub fn as_ready(&self) -> Result<ReadyPayload, ProtocolError> {
        self.data_as(OpCode::Dispatch)
    }

    /// Parse an Identify payload (op=2)
    pub fn as_identify(&self) -> Result<IdentifyPayload, ProtocolError> {
        self.data_as(OpCode::Identify)
    }

    /// Parse a Resume payload (op=6)
    pub fn as_resume(&self) -> Result<ResumePayload, ProtocolError> {
        self.data_as(OpCode::Resume)
    }

    /// Whether an Invalid Session message (op=9) allows resuming
    ///
    /// Anything other than an explicit `true` counts as not resumable.
    #[must_use]
    pub fn is_resumable_invalidation(&self) -> bool {
        self.op == OpCode::InvalidSession && self.d.as_bool().unwrap_or(false)
    }

    /// Check if this is a message the server is allowed to send
    #[must_use]
    pub fn is_valid_server_message(&self) -> bool {
        self.op.is_server_op()
    }

    // === Utilities ===

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether the data field may contain the bearer token
    fn carries_token(&self) -> bool {
        matches!(self.op, OpCode::Identify | OpCode::Resume)
    }
}

impl std::fmt::Debug for GatewayPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("GatewayPayload");
        s.field("op", &self.op).field("s", &self.s).field("t", &self.t);
        if self.carries_token() {
            s.field("d", &"<redacted>");
        } else {
            s.field("d", &self.d);
        }
        s.finish()
    }
}

impl std::fmt::Display for GatewayPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayPayload(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayPayload(op={})", self.op)
        }
    }
}
