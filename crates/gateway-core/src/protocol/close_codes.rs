//! Close codes sent by the gateway
//!
//! Every application code in the 4000 range is listed once in a single table
//! together with its name, a human readable reason and what it does to the
//! session. Lookups go through the table so the three never drift apart.

use serde::{Deserialize, Serialize};

/// What a close does to the client's session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseDisposition {
    /// Session survives, next connection resumes it
    Resume,
    /// Session is gone, next connection identifies from scratch
    Reidentify,
    /// Session is gone and no reconnect is attempted
    Fatal,
}

impl CloseDisposition {
    #[must_use]
    pub const fn keeps_session(self) -> bool {
        matches!(self, Self::Resume)
    }

    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        !matches!(self, Self::Fatal)
    }
}

/// Application close code received from the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    UnknownError = 4000,
    UnknownOpcode = 4001,
    DecodeError = 4002,
    NotAuthenticated = 4003,
    AuthenticationFailed = 4004,
    AlreadyAuthenticated = 4005,
    InvalidSequence = 4007,
    RateLimited = 4008,
    SessionTimeout = 4009,
    InvalidShard = 4010,
    ShardingRequired = 4011,
    InvalidApiVersion = 4012,
    InvalidIntents = 4013,
    DisallowedIntents = 4014,
}

/// One row of the close code table
#[derive(Clone, Copy)]
struct Entry {
    code: CloseCode,
    name: &'static str,
    reason: &'static str,
    disposition: CloseDisposition,
}

const fn entry(
    code: CloseCode,
    name: &'static str,
    reason: &'static str,
    disposition: CloseDisposition,
) -> Entry {
    Entry {
        code,
        name,
        reason,
        disposition,
    }
}

impl CloseCode {
    /// Normal closure; the gateway drops the session
    pub const NORMAL: u16 = 1000;

    /// Going away; the gateway drops the session
    pub const GOING_AWAY: u16 = 1001;

    /// Sent by the client when it closes a connection it intends to resume
    pub const RESUMABLE: u16 = Self::UnknownError.as_u16();

    const TABLE: [Entry; 14] = {
        use CloseDisposition::{Fatal, Reidentify, Resume};
        [
            entry(Self::UnknownError, "UnknownError", "Unknown error occurred", Resume),
            entry(Self::UnknownOpcode, "UnknownOpcode", "Invalid opcode sent", Resume),
            entry(Self::DecodeError, "DecodeError", "Invalid payload encoding", Resume),
            entry(Self::NotAuthenticated, "NotAuthenticated", "Payload sent before identify", Resume),
            entry(Self::AuthenticationFailed, "AuthenticationFailed", "Authentication failed", Fatal),
            entry(Self::AlreadyAuthenticated, "AlreadyAuthenticated", "Identify sent twice", Resume),
            entry(Self::InvalidSequence, "InvalidSequence", "Invalid sequence number on resume", Reidentify),
            entry(Self::RateLimited, "RateLimited", "Sending too fast", Resume),
            entry(Self::SessionTimeout, "SessionTimeout", "Session timed out", Reidentify),
            entry(Self::InvalidShard, "InvalidShard", "Invalid shard", Fatal),
            entry(Self::ShardingRequired, "ShardingRequired", "Sharding required", Fatal),
            entry(Self::InvalidApiVersion, "InvalidApiVersion", "Invalid API version", Fatal),
            entry(Self::InvalidIntents, "InvalidIntents", "Invalid intents", Fatal),
            entry(Self::DisallowedIntents, "DisallowedIntents", "Intents not permitted", Fatal),
        ]
    };

    const fn entry(self) -> Entry {
        let mut i = 0;
        while i < Self::TABLE.len() {
            if Self::TABLE[i].code as u16 == self as u16 {
                return Self::TABLE[i];
            }
            i += 1;
        }
        // Every variant has a row; the table test guards this
        Self::TABLE[0]
    }

    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::TABLE
            .iter()
            .map(|e| e.code)
            .find(|code| code.as_u16() == value)
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    #[must_use]
    pub const fn disposition(self) -> CloseDisposition {
        self.entry().disposition
    }

    /// Disposition of any raw close code
    ///
    /// Codes missing from the table, transport level closes included, keep
    /// the session.
    #[must_use]
    pub fn classify(code: u16) -> CloseDisposition {
        Self::from_u16(code).map_or(CloseDisposition::Resume, Self::disposition)
    }

    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        self.disposition().should_reconnect()
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        self.entry().reason
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        self.entry().name
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} ({})", self.as_u16(), self.name(), self.description())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
