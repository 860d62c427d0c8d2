//! Credentials - the bearer token and identifying metadata used to authenticate
//!
//! Read-only to the session engine. The token never appears in `Debug` output.

use crate::protocol::ClientProperties;
use crate::value_objects::Intents;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bearer token
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Wrap a raw token
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw token, for building handshake payloads
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the token is empty or whitespace
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

impl From<String> for Token {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for Token {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Kind of account the credential belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Service account; uses the short Identify variant
    #[default]
    Bot,
    /// Full client; Identify carries capabilities and client state
    User,
}

impl AccountKind {
    /// Whether this is a service account
    #[must_use]
    pub const fn is_service_account(self) -> bool {
        matches!(self, Self::Bot)
    }
}

impl FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bot" => Ok(Self::Bot),
            "user" => Ok(Self::User),
            other => Err(format!("Invalid account kind: {other}. Must be one of: bot, user")),
        }
    }
}

/// Everything needed to authenticate a gateway session
#[derive(Clone)]
pub struct Credential {
    /// Bearer token
    pub token: Token,
    /// Service or full-client account
    pub account: AccountKind,
    /// Client identification sent in Identify
    pub properties: ClientProperties,
    /// Event subscription mask
    pub intents: Intents,
    /// Opaque capability bitmask for full clients
    pub capabilities: u64,
}

impl Credential {
    /// Default capability constant for full clients
    pub const DEFAULT_CAPABILITIES: u64 = 16_381;

    /// Create a service-account credential with default metadata
    #[must_use]
    pub fn bot(token: impl Into<Token>) -> Self {
        Self {
            token: token.into(),
            account: AccountKind::Bot,
            properties: ClientProperties::this_library(),
            intents: Intents::default(),
            capabilities: Self::DEFAULT_CAPABILITIES,
        }
    }

    /// Create a full-client credential with default metadata
    #[must_use]
    pub fn user(token: impl Into<Token>) -> Self {
        Self {
            account: AccountKind::User,
            ..Self::bot(token)
        }
    }

    /// Set intents
    #[must_use]
    pub fn with_intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    /// Set client properties
    #[must_use]
    pub fn with_properties(mut self, properties: ClientProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Set the capability bitmask
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: u64) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// A credential can only be used if it carries a token
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.token.is_blank()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.token)
            .field("account", &self.account)
            .field("properties", &self.properties)
            .field("intents", &self.intents)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}
