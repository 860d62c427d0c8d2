//! Gateway protocol definitions
//!
//! Defines the gateway protocol including op codes, message formats, and close codes.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{CloseCode, CloseDisposition};
pub use messages::GatewayPayload;
pub use opcodes::{OpCode, OpDirection};
pub use payloads::{
    ClientProperties, ClientState, HelloPayload, IdentifyPayload, PresencePayload,
    PresenceStatus, ReadyPayload, ResumePayload,
};
