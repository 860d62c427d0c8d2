//! Value objects - immutable types that describe who connects and what they subscribe to

mod credential;
mod intents;

pub use credential::{AccountKind, Credential, Token};
pub use intents::Intents;
