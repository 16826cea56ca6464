//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/dazeus/config.toml` by default. Command-line flags override
//! whatever the file says.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::session::{RollbackPolicy, SessionOptions};
use crate::tracing::LogFormat;

/// Configuration for the dazeus client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bot address (`unix:/path` or `tcp:host:port`).
    pub address: Option<String>,

    /// Debug mode: log every raw payload.
    pub debug: bool,

    /// Session settings.
    #[serde(default)]
    pub session: SessionSettings,

    /// Echo plugin settings.
    #[serde(default)]
    pub echo: EchoSettings,

    /// Logging settings.
    #[serde(default)]
    pub log: LogSettings,
}

/// Logging settings. `RUST_LOG` overrides `filter`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `compact` or `json`.
    pub format: LogFormat,

    /// `tracing` filter directive, e.g. `dazeus_client::session=debug`.
    pub filter: Option<String>,
}

/// Session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Drop a listener again when the bot rejects its subscription.
    pub rollback_on_failure: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            rollback_on_failure: true,
        }
    }
}

/// Echo plugin settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoSettings {
    /// Command to answer.
    pub command: String,

    /// Only answer on this network.
    pub network: Option<String>,

    /// Prefix replies in channels with the sender's nick.
    pub highlight: bool,
}

impl Default for EchoSettings {
    fn default() -> Self {
        Self {
            command: "echo".to_string(),
            network: None,
            highlight: false,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| ClientError::config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dazeus")
    }

    /// Session options derived from these settings.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            rollback: if self.session.rollback_on_failure {
                RollbackPolicy::Rollback
            } else {
                RollbackPolicy::Keep
            },
            debug_payloads: self.debug,
        }
    }
}
