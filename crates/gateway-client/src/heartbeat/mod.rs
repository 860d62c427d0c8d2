//! Heartbeat scheduling and zombie detection

mod controller;

pub use controller::{HeartbeatController, HeartbeatPhase, HeartbeatSignal};
