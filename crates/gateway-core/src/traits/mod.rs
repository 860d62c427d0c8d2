//! Traits (ports) implemented outside the protocol layer

mod credentials;

pub use credentials::{CredentialProvider, StaticCredentialProvider};
