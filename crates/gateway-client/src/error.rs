//! Client errors

use gateway_common::ConfigError;
use gateway_core::ProtocolError;
use std::time::Duration;
use thiserror::Error;

/// Result type for client operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors raised by the session engine and its handle
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection refused, DNS, TLS or socket failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport did not open in time
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// No credential could be obtained, so no handshake is possible
    #[error("No credential available")]
    MissingCredential,

    /// The connection task has stopped
    #[error("Gateway client task is no longer running")]
    ClientGone,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GatewayError {
    /// Whether a reconnect may fix this error
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::ConnectTimeout(_) | Self::Protocol(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
