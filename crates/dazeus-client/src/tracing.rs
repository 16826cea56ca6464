//! Logging setup for the `dazeus` binary.
//!
//! Logs go to stderr so command output on stdout stays clean. `RUST_LOG`
//! wins over everything else; without it the `[log] filter` directive from
//! the config file applies, then the preset's level for the `dazeus*` targets.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Errors that can occur during tracing initialization.
#[derive(Debug, Error)]
pub enum TracingError {
    /// A global subscriber was already installed.
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// The configured filter directive does not parse.
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
}

/// Shape of a log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One human-readable line per event.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

/// How logging is set up.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level for the `dazeus*` targets when no filter is given.
    pub level: Level,
    /// Line format.
    pub format: LogFormat,
    /// Show file and line, drop timestamps.
    pub verbose: bool,
    /// Filter directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

impl TracingConfig {
    /// Preset for `--verbose` runs.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Compact,
            verbose: true,
            filter: None,
        }
    }

    /// Preset for long-running plugins.
    #[must_use]
    pub fn plugin() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            verbose: false,
            filter: None,
        }
    }

    /// Sets the line format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the fallback filter directive.
    #[must_use]
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, TracingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        match self.filter {
            Some(ref directive) => Ok(EnvFilter::try_new(directive)?),
            // Target directives match by prefix: covers the binary and both crates.
            None => Ok(EnvFilter::new(format!("dazeus={}", self.level))),
        }
    }
}

/// Installs the global subscriber. Call once at startup.
///
/// # Errors
///
/// Fails if a subscriber is already installed or the filter directive is
/// invalid.
pub fn init_tracing(config: &TracingConfig) -> Result<(), TracingError> {
    let filter = config.env_filter()?;

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(config.verbose)
        .with_line_number(config.verbose);
    let layer = match (config.format, config.verbose) {
        (LogFormat::Json, _) => layer.json().boxed(),
        (LogFormat::Compact, true) => layer.compact().without_time().boxed(),
        (LogFormat::Compact, false) => layer.compact().boxed(),
    };

    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(filter).with(layer))?;
    Ok(())
}
