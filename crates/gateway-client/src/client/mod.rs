//! Gateway client: the connection task and its handle

mod handle;
mod runner;

pub use handle::{GatewayClient, GatewayOptions};
