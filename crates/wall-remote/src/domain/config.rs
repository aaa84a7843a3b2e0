//! Remote configuration types.
//!
//! [`RemoteConfig`] is the single source of truth for runtime settings.  It is
//! a plain struct with sensible defaults; `main.rs` fills it from an optional
//! TOML file and then from CLI arguments, with CLI values winning.
//!
//! # TOML file layout
//!
//! Every key is optional.  Missing keys keep their default.
//!
//! ```toml
//! [connection]
//! origin = "https://wall.example.org"
//! ws_path = "/blinkenwall"
//! ws_port = 1337
//! reconnect_delay_ms = 2000
//! request_timeout_ms = 5000
//!
//! [input]
//! frame_period_ms = 16
//! axis_tolerance = 0.01
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::domain::endpoint::endpoint_from_origin;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The origin is not a valid absolute URL.
    #[error("invalid origin '{origin}': {reason}")]
    InvalidOrigin { origin: String, reason: String },

    /// The origin uses a scheme that has no WebSocket counterpart.
    #[error("unsupported origin scheme '{0}' (expected http, https, ws or wss)")]
    UnsupportedScheme(String),

    /// The origin has no host component.
    #[error("origin '{0}' has no host")]
    MissingHost(String),
}

/// All runtime configuration for the remote.
///
/// # Example
///
/// ```rust
/// use wall_remote::domain::RemoteConfig;
///
/// let cfg = RemoteConfig::default();
/// assert_eq!(cfg.endpoint().unwrap().as_str(), "ws://localhost:1337/blinkenwall");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    /// Page origin the endpoint is derived from.  `https` selects `wss`.
    pub origin: String,
    /// Path of the WebSocket endpoint on the origin host.
    pub ws_path: String,
    /// Explicit port; `None` uses the origin's port.
    pub ws_port: Option<u16>,
    /// Fixed delay between a lost connection and the next attempt.
    pub reconnect_delay: Duration,
    /// Per-request deadline.  `None` (the default) waits forever.
    pub request_timeout: Option<Duration>,
    /// Period of the gamepad frame loop.
    pub frame_period: Duration,
    /// Axis movements at or below this are ignored.
    pub axis_tolerance: f32,
}

impl RemoteConfig {
    /// The WebSocket endpoint derived from the origin, path and port.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the origin is not a usable URL.
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        endpoint_from_origin(&self.origin, self.ws_port, &self.ws_path)
    }
}

impl Default for RemoteConfig {
    /// | Field             | Default                   |
    /// |-------------------|---------------------------|
    /// | origin            | `http://localhost:1337`   |
    /// | ws_path           | `/blinkenwall`            |
    /// | ws_port           | origin's port             |
    /// | reconnect_delay   | 2 seconds                 |
    /// | request_timeout   | none                      |
    /// | frame_period      | 16 ms                     |
    /// | axis_tolerance    | 0.01                      |
    fn default() -> Self {
        Self {
            origin: default_origin(),
            ws_path: default_ws_path(),
            ws_port: None,
            reconnect_delay: Duration::from_millis(default_reconnect_delay_ms()),
            request_timeout: None,
            frame_period: Duration::from_millis(default_frame_period_ms()),
            axis_tolerance: default_axis_tolerance(),
        }
    }
}

// ── TOML schema ───────────────────────────────────────────────────────────────

/// On-disk configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub connection: ConnectionSection,
    #[serde(default)]
    pub input: InputSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSection {
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_port: Option<u16>,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSection {
    #[serde(default = "default_frame_period_ms")]
    pub frame_period_ms: u64,
    #[serde(default = "default_axis_tolerance")]
    pub axis_tolerance: f32,
}

fn default_origin() -> String {
    "http://localhost:1337".to_string()
}
fn default_ws_path() -> String {
    "/blinkenwall".to_string()
}
fn default_reconnect_delay_ms() -> u64 {
    2000
}
fn default_frame_period_ms() -> u64 {
    16
}
fn default_axis_tolerance() -> f32 {
    wall_core::input::DEFAULT_AXIS_TOLERANCE
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            ws_path: default_ws_path(),
            ws_port: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            request_timeout_ms: None,
        }
    }
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            frame_period_ms: default_frame_period_ms(),
            axis_tolerance: default_axis_tolerance(),
        }
    }
}

impl From<ConfigFile> for RemoteConfig {
    fn from(file: ConfigFile) -> Self {
        Self {
            origin: file.connection.origin,
            ws_path: file.connection.ws_path,
            ws_port: file.connection.ws_port,
            reconnect_delay: Duration::from_millis(file.connection.reconnect_delay_ms),
            request_timeout: file.connection.request_timeout_ms.map(Duration::from_millis),
            frame_period: Duration::from_millis(file.input.frame_period_ms),
            axis_tolerance: file.input.axis_tolerance,
        }
    }
}

/// Parses a config file from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed or a value has the
/// wrong type.
pub fn parse_config(content: &str) -> Result<ConfigFile, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Reads and parses the config file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read (including when it
/// does not exist) and [`ConfigError::Parse`] if it is malformed.
pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
