//! Integration test utilities for the gateway client
//!
//! Provides a fake gateway that speaks the protocol over a real WebSocket
//! on localhost, plus payload fixtures.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
