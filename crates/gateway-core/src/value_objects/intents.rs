//! Gateway intents bitflags
//!
//! Intents select which groups of dispatch events the gateway sends.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

bitflags! {
    /// Event subscription flags sent in Identify
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u64 {
        /// Guild create/update/delete, roles, channels
        const GUILDS                   = 1 << 0;
        /// Member add/update/remove
        const GUILD_MEMBERS            = 1 << 1;
        /// Bans and audit log entries
        const GUILD_MODERATION         = 1 << 2;
        /// Emoji and sticker updates
        const GUILD_EXPRESSIONS        = 1 << 3;
        /// Integration updates
        const GUILD_INTEGRATIONS       = 1 << 4;
        /// Webhook updates
        const GUILD_WEBHOOKS           = 1 << 5;
        /// Invite create/delete
        const GUILD_INVITES            = 1 << 6;
        /// Voice state updates
        const GUILD_VOICE_STATES       = 1 << 7;
        /// Presence updates
        const GUILD_PRESENCES          = 1 << 8;
        /// Messages in guild channels
        const GUILD_MESSAGES           = 1 << 9;
        /// Reactions in guild channels
        const GUILD_MESSAGE_REACTIONS  = 1 << 10;
        /// Typing in guild channels
        const GUILD_MESSAGE_TYPING     = 1 << 11;
        /// Direct messages
        const DIRECT_MESSAGES          = 1 << 12;
        /// Reactions in direct messages
        const DIRECT_MESSAGE_REACTIONS = 1 << 13;
        /// Typing in direct messages
        const DIRECT_MESSAGE_TYPING    = 1 << 14;
        /// Message content in message events
        const MESSAGE_CONTENT          = 1 << 15;

        /// Default subscription for a service account
        const DEFAULT = Self::GUILDS.bits() | Self::GUILD_MESSAGES.bits();

        /// Intents that require explicit approval
        const PRIVILEGED = Self::GUILD_MEMBERS.bits()
            | Self::GUILD_PRESENCES.bits()
            | Self::MESSAGE_CONTENT.bits();
    }
}

impl Intents {
    /// Check if any privileged intent is requested
    #[inline]
    pub fn is_privileged(&self) -> bool {
        self.intersects(Self::PRIVILEGED)
    }

    /// Parse from a raw bitmask, keeping unknown bits
    #[must_use]
    pub fn from_raw(bits: u64) -> Self {
        Self::from_bits_retain(bits)
    }
}

impl Default for Intents {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Intents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

impl Serialize for Intents {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self::from_raw(u64::deserialize(deserializer)?))
    }
}
