//! Session lifecycle: identity, backoff and the connection state machine

mod backoff;
mod machine;
mod state;

pub use backoff::Backoff;
pub use machine::{Effect, SessionInput, SessionMachine, MALFORMED_LIMIT};
pub use state::{ConnectionState, HandshakeKind, Session};
