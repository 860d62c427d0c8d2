//! Session identity and connection lifecycle state

use std::fmt;

/// The logical session as known to the server
///
/// Survives reconnects; cleared when the server will not accept a resume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Assigned by READY
    pub id: Option<String>,
    /// Last seen dispatch sequence
    pub sequence: Option<u64>,
    /// Gateway to reconnect to when resuming
    pub resume_url: Option<String>,
}

impl Session {
    /// Move the cursor forward; it never moves backward
    ///
    /// Returns `true` if the cursor changed.
    pub fn advance(&mut self, sequence: u64) -> bool {
        match self.sequence {
            Some(current) if current >= sequence => false,
            _ => {
                self.sequence = Some(sequence);
                true
            }
        }
    }

    /// Record the identity handed out by READY
    pub fn establish(&mut self, id: String, resume_url: Option<String>) {
        self.id = Some(id);
        self.resume_url = resume_url;
    }

    /// Both an id and a cursor are needed to resume
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        self.id.is_some() && self.sequence.is_some()
    }

    /// Forget everything; the next handshake will be a fresh Identify
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Which handshake was sent after Hello
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeKind {
    Identify,
    Resume,
}

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Idle; only an explicit start leaves this state
    #[default]
    Disconnected,
    /// Opening the transport
    Connecting,
    /// Transport open, waiting for Hello
    AwaitingHello,
    /// Identify or Resume sent
    Handshaking(HandshakeKind),
    /// Session is live
    Established,
    /// Waiting out the backoff delay before the given attempt
    Reconnecting { attempt: u32 },
    /// Explicit close in progress
    Closing,
}

impl ConnectionState {
    /// States in which a transport is open
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(
            self,
            Self::AwaitingHello | Self::Handshaking(_) | Self::Established
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Handshaking(HandshakeKind::Identify) => "identifying",
            Self::Handshaking(HandshakeKind::Resume) => "resuming",
            Self::Established => "established",
            Self::Reconnecting { .. } => "reconnecting",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
