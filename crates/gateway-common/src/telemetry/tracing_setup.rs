//! Global `tracing` subscriber
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to every
//! target.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::Environment;

/// Output encoding of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, one event per line
    Pretty,
    /// One JSON object per event
    Json,
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Fallback filter when `RUST_LOG` is absent
    pub level: Level,
    pub format: LogFormat,
    /// Log span open and close
    pub span_events: bool,
    /// Attach file and line to each event
    pub source_location: bool,
    pub thread_names: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            span_events: false,
            source_location: true,
            thread_names: false,
        }
    }
}

impl TracingConfig {
    /// Debug level with span lifecycle and thread names
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            span_events: true,
            thread_names: true,
            ..Self::default()
        }
    }

    /// JSON lines at info, no source locations
    #[must_use]
    pub fn production() -> Self {
        Self {
            format: LogFormat::Json,
            source_location: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Development => Self::development(),
            Environment::Staging => Self::default(),
            Environment::Production => Self::production(),
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.to_string()))
    }

    fn fmt_span(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Install the subscriber with [`TracingConfig::default`]
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(&TracingConfig::default())
}

/// Install the subscriber described by `config`
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn try_init_tracing_with_config(config: &TracingConfig) -> Result<(), TracingError> {
    let registry = tracing_subscriber::registry().with(config.filter());

    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(config.source_location)
                    .with_line_number(config.source_location)
                    .with_thread_names(config.thread_names)
                    .with_span_events(config.fmt_span()),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_file(config.source_location)
                    .with_line_number(config.source_location)
                    .with_thread_names(config.thread_names)
                    .with_span_events(config.fmt_span()),
            )
            .try_init(),
    };

    installed.map_err(|_| TracingError::AlreadyInitialized)
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}
