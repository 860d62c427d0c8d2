//! Payload definitions
//!
//! Defines the `d` field structures for the control messages exchanged with the gateway.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Payload for op 10 (Hello)
///
/// Sent by the server immediately after connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    /// Create a Hello payload with the given interval
    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }
}

/// Payload for op 2 (Identify)
///
/// Starts a brand-new session.
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Authentication token
    pub token: String,

    /// Client identification properties
    pub properties: ClientProperties,

    /// Payload compression; stream compression is negotiated through the URL instead
    pub compress: bool,

    /// Member count threshold for offline member lists
    pub large_threshold: Option<u32>,

    /// `[shard_id, num_shards]`
    pub shard: Option<[u32; 2]>,

    /// Initial presence
    pub presence: PresencePayload,

    /// Client state block (full-client handshake only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub client_state: Option<ClientState>,

    /// Capability bitmask (full-client handshake only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub capabilities: Option<u64>,

    /// Subscription intents bitmask
    pub intents: u64,
}

impl std::fmt::Debug for IdentifyPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifyPayload")
            .field("token", &"<redacted>")
            .field("properties", &self.properties)
            .field("presence", &self.presence)
            .field("capabilities", &self.capabilities)
            .field("intents", &self.intents)
            .finish()
    }
}

/// Client connection properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProperties {
    /// Operating system
    pub os: String,

    /// Browser or client library name
    pub browser: String,

    /// Device name
    pub device: String,
}

impl ClientProperties {
    /// Create properties with the given values
    #[must_use]
    pub fn new(os: impl Into<String>, browser: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            browser: browser.into(),
            device: device.into(),
        }
    }

    /// Properties describing this library on the current host
    #[must_use]
    pub fn this_library() -> Self {
        Self::new(std::env::consts::OS, "gateway-client", "gateway-client")
    }

    /// Set operating system
    #[must_use]
    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    /// Set browser
    #[must_use]
    pub fn with_browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = browser.into();
        self
    }

    /// Set device type
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }
}

impl Default for ClientProperties {
    fn default() -> Self {
        Self::this_library()
    }
}

/// Online status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    #[default]
    Online,
    Idle,
    Dnd,
    Invisible,
    Offline,
}

impl PresenceStatus {
    /// Get the wire string for this status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::Dnd => "dnd",
            Self::Invisible => "invisible",
            Self::Offline => "offline",
        }
    }
}

impl FromStr for PresenceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "idle" => Ok(Self::Idle),
            "dnd" => Ok(Self::Dnd),
            "invisible" => Ok(Self::Invisible),
            "offline" => Ok(Self::Offline),
            other => Err(format!(
                "Invalid status: {other}. Must be one of: online, idle, dnd, invisible, offline"
            )),
        }
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presence block, used in Identify and as the op 3 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresencePayload {
    /// Unix time in milliseconds the client went idle, or 0
    pub since: u64,

    /// Activities being shown
    pub activities: Vec<Value>,

    /// Online status
    pub status: PresenceStatus,

    /// Whether the client is away from keyboard
    pub afk: bool,
}

impl PresencePayload {
    /// Presence with the given status and no activities
    #[must_use]
    pub fn with_status(status: PresenceStatus) -> Self {
        Self {
            since: 0,
            activities: Vec::new(),
            status,
            afk: false,
        }
    }
}

impl Default for PresencePayload {
    fn default() -> Self {
        Self::with_status(PresenceStatus::Online)
    }
}

/// Client state block required by the full-client Identify variant
///
/// The values are zeroed placeholders; the client keeps no cached state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientState {
    pub guild_versions: Map<String, Value>,
    pub highest_last_message_id: String,
    pub read_state_version: i64,
    pub user_guild_settings_version: i64,
    pub user_settings_version: i64,
    pub private_channels_version: String,
    pub api_code_version: i64,
}

impl ClientState {
    /// Placeholder state announcing that nothing is cached
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            guild_versions: Map::new(),
            highest_last_message_id: "0".to_string(),
            read_state_version: 0,
            user_guild_settings_version: -1,
            user_settings_version: -1,
            private_channels_version: "0".to_string(),
            api_code_version: 0,
        }
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::placeholder()
    }
}

/// Payload for op 6 (Resume)
///
/// Sent by the client to resume a disconnected session.
#[derive(Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    /// Authentication token
    pub token: String,

    /// Session ID to resume
    pub session_id: String,

    /// Last received sequence number
    pub seq: Option<u64>,
}

impl std::fmt::Debug for ResumePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumePayload")
            .field("token", &"<redacted>")
            .field("session_id", &self.session_id)
            .field("seq", &self.seq)
            .finish()
    }
}

/// The parts of the READY dispatch the session engine needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyPayload {
    /// Session ID to use for resume
    pub session_id: String,

    /// Gateway URL to use when resuming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_gateway_url: Option<String>,
}
