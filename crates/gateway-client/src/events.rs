//! What the consumer sees: lifecycle events, dispatches and a status snapshot

use gateway_core::DispatchEvent;
use std::time::Duration;

use crate::session::ConnectionState;

/// Events delivered on the client's event channel, in order
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Transport opened
    Connected,
    /// Fresh session established
    Ready { session_id: String },
    /// Prior session resumed
    Resumed,
    /// A server event
    Dispatch(DispatchEvent),
    /// The server discarded the session; cached state may be stale
    SessionInvalidated,
    /// Transport lost
    Disconnected { code: Option<u16>, resumable: bool },
    /// Waiting before the next connect attempt
    Reconnecting { attempt: u32, delay: Duration },
    /// Explicit close finished
    Closed,
    /// Something the consumer should know about; fatal ones end in `disconnected`
    Error(String),
}

/// Point-in-time view of the session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientStatus {
    pub state: ConnectionState,
    pub session_id: Option<String>,
    pub sequence: Option<u64>,
    /// Last heartbeat round trip
    pub latency: Option<Duration>,
}
