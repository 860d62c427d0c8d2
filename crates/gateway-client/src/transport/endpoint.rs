//! Gateway connect URL

use gateway_common::EndpointConfig;
use url::Url;

use crate::error::{GatewayError, GatewayResult};

/// Query keys this client owns
const MANAGED_KEYS: [&str; 3] = ["v", "encoding", "compress"];

/// Base gateway URL plus the query parameters every connection carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEndpoint {
    base: Url,
    version: u8,
    encoding: String,
    compress: bool,
}

impl GatewayEndpoint {
    /// Parse a ws:// or wss:// URL with protocol v10, JSON and compression
    pub fn parse(url: &str) -> GatewayResult<Self> {
        Ok(Self {
            base: parse_ws_url(url)?,
            version: 10,
            encoding: "json".to_string(),
            compress: true,
        })
    }

    pub fn from_config(config: &EndpointConfig) -> GatewayResult<Self> {
        Ok(Self::parse(&config.url)?
            .with_version(config.version)
            .with_encoding(config.encoding.clone())
            .with_compression(config.compress))
    }

    #[must_use]
    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Whether the transport is zlib-stream compressed
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.compress
    }

    /// URL for a fresh connection
    #[must_use]
    pub fn url(&self) -> Url {
        self.decorate(self.base.clone())
    }

    /// URL for a resume; falls back to the base URL if the hint is unusable
    #[must_use]
    pub fn resume_url(&self, hint: Option<&str>) -> Url {
        match hint.map(parse_ws_url) {
            Some(Ok(url)) => self.decorate(url),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Ignoring unusable resume gateway URL");
                self.url()
            }
            None => self.url(),
        }
    }

    fn decorate(&self, mut url: Url) -> Url {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !MANAGED_KEYS.contains(&&**k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        url.set_query(None);
        {
            let mut query = url.query_pairs_mut();
            query.extend_pairs(kept);
            query.append_pair("v", &self.version.to_string());
            query.append_pair("encoding", &self.encoding);
            if self.compress {
                query.append_pair("compress", "zlib-stream");
            }
        }
        url
    }
}

fn parse_ws_url(raw: &str) -> GatewayResult<Url> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(GatewayError::Transport(format!(
            "unsupported gateway scheme {other}"
        ))),
    }
}
