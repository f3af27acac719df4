//! Configuration loading for signal-relay.
//!
//! Configuration is loaded from an optional TOML file. Every field has a
//! default, so an empty file (or no file at all) yields a working relay.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration for signal-relay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Listener configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Signaling protocol configuration.
    #[serde(default)]
    pub relay: RelayConfig,
    /// Static asset configuration.
    #[serde(default)]
    pub assets: AssetsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind (default: 0.0.0.0, all interfaces).
    #[serde(default = "default_host")]
    pub host: String,
    /// Port shared by the relay and the asset server (default: 4444).
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Signaling protocol configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Path that is upgraded to a signaling WebSocket (default: /signaling).
    #[serde(default = "default_relay_path")]
    pub path: String,
    /// Frames buffered per connection before fan-out skips it (default: 256).
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
    /// Largest accepted inbound frame in bytes (default: 1MB).
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Close connections that stay silent this long, in seconds (default: 0, disabled).
    #[serde(default)]
    pub idle_timeout_secs: u64,
}

/// Static asset configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    /// Directory holding the built application (default: dist).
    #[serde(default = "default_assets_root")]
    pub root: PathBuf,
    /// Entry document served for application routes (default: index.html).
    #[serde(default = "default_assets_index")]
    pub index: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4444
}

fn default_relay_path() -> String {
    "/signaling".to_string()
}

fn default_outbound_queue_capacity() -> usize {
    256
}

fn default_max_message_size() -> usize {
    1024 * 1024 // 1MB
}

fn default_assets_root() -> PathBuf {
    PathBuf::from("dist")
}

fn default_assets_index() -> String {
    "index.html".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            path: default_relay_path(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            max_message_size: default_max_message_size(),
            idle_timeout_secs: 0,
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: default_assets_root(),
            index: default_assets_index(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.relay.path.starts_with('/') {
            return Err(ConfigError::Invalid {
                reason: format!("relay.path must start with '/': {:?}", self.relay.path),
            });
        }
        if self.relay.outbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "relay.outbound_queue_capacity must be > 0".to_string(),
            });
        }
        if self.relay.max_message_size == 0 {
            return Err(ConfigError::Invalid {
                reason: "relay.max_message_size must be > 0".to_string(),
            });
        }
        if self.assets.index.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "assets.index must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Socket address string for the shared listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}
