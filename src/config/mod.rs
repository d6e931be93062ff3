//! Configuration module for posegate
//!
//! This module holds the controller-side settings for a pose session:
//! - Rate governor mode
//! - Streaming destination and send timeout
//! - Command channel sizing and worker idle polling
//! - Handshake timeouts and the shutdown grace period
//!
//! # Config Location
//!
//! The default config file lives in the platform config directory:
//! - **Linux**: `~/.config/posegate/config.toml`
//! - **macOS**: `~/Library/Application Support/posegate/config.toml`
//! - **Windows**: `%APPDATA%\posegate\config.toml`
//!
//! Every field has a default, so a partial file (or none) is valid.
//!
//! # Example
//!
//! ```ignore
//! use posegate::config::PoseConfig;
//!
//! let mut config = PoseConfig::load_or_default(None);
//! config.rate_mode = RateMode::MatchCapture;
//! config.save("session.toml")?;
//! ```

use crate::error::{PoseError, Result};
use crate::worker::RateMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "posegate";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default renderer address for the keypoint stream
pub const DEFAULT_STREAM_DESTINATION: &str = "127.0.0.1:8051";

/// Default socket send timeout in milliseconds
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 50;

/// Default idle wait of the worker loop in milliseconds
pub const DEFAULT_IDLE_POLL_MS: u64 = 2;

/// Get the path of the default config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Top-level pose session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseConfig {
    /// How the worker decides whether to run inference
    #[serde(default)]
    pub rate_mode: RateMode,

    /// Keypoint streaming settings
    #[serde(default)]
    pub stream: StreamConfig,

    /// Slots per command channel direction
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// How long an idle worker iteration waits for a command (ms)
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,

    /// Scale factor applied to poses handed to the display
    #[serde(default = "default_display_resize")]
    pub display_resize: f64,

    /// Handshake timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_channel_capacity() -> usize {
    crate::channel::DEFAULT_CHANNEL_CAPACITY
}

fn default_idle_poll_ms() -> u64 {
    DEFAULT_IDLE_POLL_MS
}

fn default_display_resize() -> f64 {
    1.0
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            rate_mode: RateMode::default(),
            stream: StreamConfig::default(),
            channel_capacity: default_channel_capacity(),
            idle_poll_ms: DEFAULT_IDLE_POLL_MS,
            display_resize: 1.0,
            timeouts: TimeoutConfig::default(),
            log_dir: None,
        }
    }
}

impl PoseConfig {
    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PoseError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            PoseError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or the default location when `None`, falling back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => return Self::default(),
            },
        };
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Write the config as TOML, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                PoseError::Config(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| PoseError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| PoseError::Config(format!("Failed to write config: {}", e)))
    }

    /// Reject values the worker cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(PoseError::Config(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        if !(self.display_resize.is_finite() && self.display_resize > 0.0) {
            return Err(PoseError::Config(format!(
                "display_resize must be positive, got {}",
                self.display_resize
            )));
        }
        self.stream.socket_addr()?;
        Ok(())
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

/// Keypoint stream settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Whether datagrams are sent at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Renderer address, `host:port`
    #[serde(default = "default_destination")]
    pub destination: String,

    /// Upper bound on a single send (ms)
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_destination() -> String {
    DEFAULT_STREAM_DESTINATION.to_string()
}

fn default_send_timeout_ms() -> u64 {
    DEFAULT_SEND_TIMEOUT_MS
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            destination: default_destination(),
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
        }
    }
}

impl StreamConfig {
    /// Stream to a specific address with default timing
    pub fn to(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            ..Self::default()
        }
    }

    /// Resolve the destination address
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr> {
        use std::net::ToSocketAddrs;
        self.destination
            .to_socket_addrs()
            .map_err(|e| {
                PoseError::Config(format!("Invalid stream destination {}: {}", self.destination, e))
            })?
            .next()
            .ok_or_else(|| {
                PoseError::Config(format!("Stream destination {} did not resolve", self.destination))
            })
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms.max(1))
    }
}

/// Timeouts for controller handshakes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Waiting for the worker's start-up report (s)
    #[serde(default = "default_start_secs")]
    pub start_secs: f64,

    /// Waiting for a write acknowledgment (s)
    #[serde(default = "default_record_secs")]
    pub record_secs: f64,

    /// Waiting for a save reply (s)
    #[serde(default = "default_save_secs")]
    pub save_secs: f64,

    /// Grace period between the end acknowledgment and forced termination (s)
    #[serde(default = "default_join_grace_secs")]
    pub join_grace_secs: f64,
}

fn default_start_secs() -> f64 {
    300.0
}

fn default_record_secs() -> f64 {
    5.0
}

fn default_save_secs() -> f64 {
    60.0
}

fn default_join_grace_secs() -> f64 {
    5.0
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            start_secs: default_start_secs(),
            record_secs: default_record_secs(),
            save_secs: default_save_secs(),
            join_grace_secs: default_join_grace_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn start(&self) -> Duration {
        secs(self.start_secs)
    }

    pub fn record(&self) -> Duration {
        secs(self.record_secs)
    }

    pub fn save(&self) -> Duration {
        secs(self.save_secs)
    }

    pub fn join_grace(&self) -> Duration {
        secs(self.join_grace_secs)
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
