//! Client configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use gateway_core::{AccountKind, Credential, Intents, Token};
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub app: AppSettings,
    pub endpoint: EndpointConfig,
    pub reconnect: ReconnectConfig,
    pub identity: IdentityConfig,
    /// Capacity of the event channel handed to the consumer
    pub event_buffer: usize,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment {other}")),
        }
    }
}

/// Where and how to connect
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Base gateway URL (ws:// or wss://)
    pub url: String,
    /// Protocol version sent as `v`
    pub version: u8,
    /// Payload encoding sent as `encoding`
    pub encoding: String,
    /// Request a zlib-stream compressed transport
    pub compress: bool,
    pub connect_timeout_ms: u64,
}

impl EndpointConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Reconnect backoff policy
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction of each delay that may be shaved off at random (0.0 - 1.0)
    pub jitter: f64,
    /// Give up after this many consecutive failures; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl ReconnectConfig {
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_reconnect_base_ms(),
            max_delay_ms: default_reconnect_max_ms(),
            jitter: default_reconnect_jitter(),
            max_attempts: None,
        }
    }
}

/// Identity used to build a credential
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Bearer token; redacted in `Debug`
    pub token: Option<Token>,
    pub account: AccountKind,
    pub intents: Intents,
    pub capabilities: u64,
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl IdentityConfig {
    /// Build a credential from the configured token, if one is set
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        let token = self.token.clone().filter(|t| !t.is_blank())?;
        let base = match self.account {
            AccountKind::Bot => Credential::bot(token),
            AccountKind::User => Credential::user(token),
        };
        Some(
            base.with_intents(self.intents)
                .with_capabilities(self.capabilities)
                .with_properties(gateway_core::ClientProperties::new(
                    self.os.clone(),
                    self.browser.clone(),
                    self.device.clone(),
                )),
        )
    }
}

// Default value functions
fn default_app_name() -> String {
    "gateway-client".to_string()
}

fn default_version() -> u8 {
    10
}

fn default_encoding() -> String {
    "json".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

fn default_reconnect_base_ms() -> u64 {
    1_000
}

fn default_reconnect_max_ms() -> u64 {
    60_000
}

fn default_reconnect_jitter() -> f64 {
    0.25
}

fn default_event_buffer() -> usize {
    256
}

/// Read an optional variable and parse it, reporting unparsable values
fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
    }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<bool>, ConfigError> {
    match lookup(name).map(|s| s.trim().to_lowercase()) {
        None => Ok(None),
        Some(raw) => match raw.as_str() {
            "" => Ok(None),
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue(name, raw)),
        },
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a required variable is missing or a value does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    ///
    /// # Errors
    /// Returns an error if a required variable is missing or a value does not parse
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("GATEWAY_URL")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingVar("GATEWAY_URL"))?;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::InvalidValue("GATEWAY_URL", url));
        }

        let reconnect = ReconnectConfig {
            base_delay_ms: parse_var(&lookup, "GATEWAY_RECONNECT_BASE_MS")?
                .unwrap_or_else(default_reconnect_base_ms),
            max_delay_ms: parse_var(&lookup, "GATEWAY_RECONNECT_MAX_MS")?
                .unwrap_or_else(default_reconnect_max_ms),
            jitter: parse_var(&lookup, "GATEWAY_RECONNECT_JITTER")?
                .unwrap_or_else(default_reconnect_jitter),
            max_attempts: parse_var(&lookup, "GATEWAY_MAX_RECONNECT_ATTEMPTS")?,
        };
        if !(0.0..=1.0).contains(&reconnect.jitter) {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_RECONNECT_JITTER",
                reconnect.jitter.to_string(),
            ));
        }
        if reconnect.max_delay_ms < reconnect.base_delay_ms {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_RECONNECT_MAX_MS",
                reconnect.max_delay_ms.to_string(),
            ));
        }

        let account = match lookup("GATEWAY_ACCOUNT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GATEWAY_ACCOUNT", raw))?,
            None => AccountKind::default(),
        };

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_default(),
            },
            endpoint: EndpointConfig {
                url,
                version: parse_var(&lookup, "GATEWAY_VERSION")?.unwrap_or_else(default_version),
                encoding: lookup("GATEWAY_ENCODING").unwrap_or_else(default_encoding),
                compress: parse_bool(&lookup, "GATEWAY_COMPRESS")?.unwrap_or(true),
                connect_timeout_ms: parse_var(&lookup, "GATEWAY_CONNECT_TIMEOUT_MS")?
                    .unwrap_or_else(default_connect_timeout_ms),
            },
            reconnect,
            identity: IdentityConfig {
                token: lookup("GATEWAY_TOKEN").map(Token::from),
                account,
                intents: parse_var::<u64, _>(&lookup, "GATEWAY_INTENTS")?
                    .map_or_else(Intents::default, Intents::from_raw),
                capabilities: parse_var(&lookup, "GATEWAY_CAPABILITIES")?
                    .unwrap_or(Credential::DEFAULT_CAPABILITIES),
                os: lookup("CLIENT_OS").unwrap_or_else(|| env::consts::OS.to_string()),
                browser: lookup("CLIENT_BROWSER").unwrap_or_else(default_app_name),
                device: lookup("CLIENT_DEVICE").unwrap_or_else(default_app_name),
            },
            event_buffer: parse_var(&lookup, "GATEWAY_EVENT_BUFFER")?
                .filter(|n: &usize| *n > 0)
                .unwrap_or_else(default_event_buffer),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_environment_is_production() {
        assert!(!Environment::Development.is_production());
        assert!(!Environment::Staging.is_production());
        assert!(Environment::Production.is_production());
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!("PRODUCTION".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!("dev".parse::<Environment>(), Ok(Environment::Development));
        assert!("moon".parse::<Environment>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup_from(&[(
            "GATEWAY_URL",
            "wss://gateway.example.com",
        )]))
        .unwrap();

        assert_eq!(config.endpoint.version, 10);
        assert_eq!(config.endpoint.encoding, "json");
        assert!(config.endpoint.compress);
        assert_eq!(config.endpoint.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.reconnect, ReconnectConfig::default());
        assert_eq!(config.reconnect.max_attempts, None);
        assert_eq!(config.event_buffer, 256);
        assert_eq!(config.identity.intents, Intents::DEFAULT);
        assert_eq!(config.identity.capabilities, 16_381);
        assert_eq!(config.identity.account, AccountKind::Bot);
        assert!(config.identity.credential().is_none());
        assert!(config.app.env.is_development());
    }

    #[test]
    fn test_missing_url() {
        let result = ClientConfig::from_lookup(lookup_from(&[]));
        assert!(matches!(result, Err(ConfigError::MissingVar("GATEWAY_URL"))));
    }

    #[test]
    fn test_rejects_non_websocket_url() {
        let result = ClientConfig::from_lookup(lookup_from(&[("GATEWAY_URL", "https://x")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue("GATEWAY_URL", _))));
    }

    #[test]
    fn test_invalid_number() {
        let result = ClientConfig::from_lookup(lookup_from(&[
            ("GATEWAY_URL", "ws://localhost:1"),
            ("GATEWAY_RECONNECT_BASE_MS", "soon"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue("GATEWAY_RECONNECT_BASE_MS", _))
        ));
    }

    #[test]
    fn test_invalid_jitter() {
        let result = ClientConfig::from_lookup(lookup_from(&[
            ("GATEWAY_URL", "ws://localhost:1"),
            ("GATEWAY_RECONNECT_JITTER", "1.5"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue("GATEWAY_RECONNECT_JITTER", _))
        ));
    }

    #[test]
    fn test_overrides_and_credential() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("GATEWAY_URL", "ws://localhost:9000"),
            ("GATEWAY_COMPRESS", "false"),
            ("GATEWAY_MAX_RECONNECT_ATTEMPTS", "3"),
            ("GATEWAY_TOKEN", "secret"),
            ("GATEWAY_ACCOUNT", "user"),
            ("GATEWAY_INTENTS", "4096"),
            ("GATEWAY_CAPABILITIES", "30717"),
            ("CLIENT_OS", "plan9"),
        ]))
        .unwrap();

        assert!(!config.endpoint.compress);
        assert_eq!(config.reconnect.max_attempts, Some(3));

        let credential = config.identity.credential().unwrap();
        assert_eq!(credential.token.expose(), "secret");
        assert_eq!(credential.account, AccountKind::User);
        assert_eq!(credential.intents, Intents::DIRECT_MESSAGES);
        assert_eq!(credential.capabilities, 30_717);
        assert_eq!(credential.properties.os, "plan9");

        // Token stays out of debug output
        assert!(!format!("{config:?}").contains("secret"));
    }
}
