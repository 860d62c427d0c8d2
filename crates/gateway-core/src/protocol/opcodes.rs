//! Op codes of the gateway envelope (`op` field)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProtocolError;

/// Which end of the connection may send an op
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpDirection {
    ClientToServer,
    ServerToClient,
    Both,
}

/// Envelope op code
///
/// Numbers missing from the table (4, 5, 8) are unused by this protocol
/// version and rejected on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum OpCode {
    Dispatch = 0,
    /// Client liveness beat; from the server it means "beat now"
    Heartbeat = 1,
    Identify = 2,
    PresenceUpdate = 3,
    Resume = 6,
    /// Server asks for a reconnect followed by a resume
    Reconnect = 7,
    /// `d` is a bool telling whether the session may still be resumed
    InvalidSession = 9,
    /// First payload on a connection; carries the heartbeat interval
    Hello = 10,
    HeartbeatAck = 11,
}

impl OpCode {
    const ALL: [Self; 9] = [
        Self::Dispatch,
        Self::Heartbeat,
        Self::Identify,
        Self::PresenceUpdate,
        Self::Resume,
        Self::Reconnect,
        Self::InvalidSession,
        Self::Hello,
        Self::HeartbeatAck,
    ];

    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_u8() == value)
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn direction(self) -> OpDirection {
        match self {
            Self::Heartbeat => OpDirection::Both,
            Self::Identify | Self::PresenceUpdate | Self::Resume => OpDirection::ClientToServer,
            Self::Dispatch
            | Self::Reconnect
            | Self::InvalidSession
            | Self::Hello
            | Self::HeartbeatAck => OpDirection::ServerToClient,
        }
    }

    /// The client may send this op
    #[must_use]
    pub const fn is_client_op(self) -> bool {
        !matches!(self.direction(), OpDirection::ServerToClient)
    }

    /// The server may send this op
    #[must_use]
    pub const fn is_server_op(self) -> bool {
        !matches!(self.direction(), OpDirection::ClientToServer)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "DISPATCH",
            Self::Heartbeat => "HEARTBEAT",
            Self::Identify => "IDENTIFY",
            Self::PresenceUpdate => "PRESENCE_UPDATE",
            Self::Resume => "RESUME",
            Self::Reconnect => "RECONNECT",
            Self::InvalidSession => "INVALID_SESSION",
            Self::Hello => "HELLO",
            Self::HeartbeatAck => "HEARTBEAT_ACK",
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(ProtocolError::UnknownOpCode(value))
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        op.as_u8()
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.as_u8(), self.name())
    }
}
