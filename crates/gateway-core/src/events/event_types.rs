//! Well-known dispatch event names
//!
//! `Ready` and `Resumed` drive the session; the rest are for consumers
//! matching on `DispatchEvent::kind`. Anything not listed here still reaches
//! the consumer; it just has no `GatewayEventType`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayEventType {
    /// Completes a fresh identify and carries the session id
    Ready,
    /// Sent once the server has replayed everything missed before a resume
    Resumed,
    GuildCreate,
    MessageCreate,
    PresenceUpdate,
}

impl GatewayEventType {
    const KNOWN: [(Self, &'static str); 5] = [
        (Self::Ready, "READY"),
        (Self::Resumed, "RESUMED"),
        (Self::GuildCreate, "GUILD_CREATE"),
        (Self::MessageCreate, "MESSAGE_CREATE"),
        (Self::PresenceUpdate, "PRESENCE_UPDATE"),
    ];

    /// Name as it appears in the `t` field
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        let mut i = 0;
        while i < Self::KNOWN.len() {
            if Self::KNOWN[i].0 as u8 == self as u8 {
                return Self::KNOWN[i].1;
            }
            i += 1;
        }
        Self::KNOWN[0].1
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::KNOWN
            .iter()
            .find(|(_, known)| *known == name)
            .map(|(kind, _)| *kind)
    }
}

impl fmt::Display for GatewayEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
