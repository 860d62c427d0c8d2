//! # gateway-core
//!
//! Protocol layer for the real-time gateway: op codes, close codes, the wire
//! envelope, payload shapes, credentials, and decoded dispatch events.
//! This crate has zero dependencies on transport or runtime.

pub mod error;
pub mod events;
pub mod protocol;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use error::ProtocolError;
pub use events::{DispatchEvent, GatewayEventType};
pub use protocol::{
    ClientProperties, ClientState, CloseCode, CloseDisposition, GatewayPayload, HelloPayload,
    IdentifyPayload, OpCode, OpDirection, PresencePayload, PresenceStatus, ReadyPayload,
    ResumePayload,
};
pub use traits::{CredentialProvider, StaticCredentialProvider};
pub use value_objects::{AccountKind, Credential, Intents, Token};
