//! Gateway events
//!
//! Dispatch events surfaced to the consumer and the names the session engine recognises.

mod dispatch;
mod event_types;

pub use dispatch::DispatchEvent;
pub use event_types::GatewayEventType;
