//! Service configuration.
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/honeyfs/config.toml`
//! - macOS: `~/Library/Application Support/honeyfs/config.toml`
//! - Windows: `%APPDATA%\honeyfs\config.toml`
//!
//! Every section and every key is optional.
//!
//! # Examples
//!
//! ```
//! use honeyfs_core::config::{BusyPolicy, ServiceConfig};
//!
//! let config: ServiceConfig = toml::from_str(r#"
//!     [control]
//!     endpoint = "decoy_pipe"
//!     busy_policy = "refuse"
//! "#).unwrap();
//!
//! assert_eq!(config.control.endpoint, "decoy_pipe");
//! assert_eq!(config.control.busy_policy, BusyPolicy::Refuse);
//! assert_eq!(config.client.attempts, 3);
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Well-known name of the control channel.
pub const DEFAULT_ENDPOINT: &str = "honeyfs_control";

/// Largest control frame accepted by default (1 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Hard ceiling for `control.max_frame_bytes`.
pub const MAX_FRAME_BYTES_LIMIT: usize = 64 * 1024 * 1024;

/// Largest size a retained write may grow a file to (64 MiB).
pub const DEFAULT_MAX_FILE_BYTES: usize = 64 * 1024 * 1024;

/// What the control server does with a second client while one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Leave the second client pending until the active one disconnects.
    #[default]
    Queue,
    /// Accept the second client, answer with a busy response, and close it.
    Refuse,
}

/// Whether bytes written through the projection are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteRetention {
    /// Report the full length as written, store nothing.
    #[default]
    Discard,
    /// Splice written bytes into the node's content.
    Retain,
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Control channel settings
    #[serde(default)]
    pub control: ControlConfig,

    /// Namespace settings
    #[serde(default)]
    pub namespace: NamespaceConfig,

    /// Access logging and alerting
    #[serde(default)]
    pub access: AccessConfig,

    /// Control client behaviour
    #[serde(default)]
    pub client: ClientConfig,

    /// Kernel mount of the decoy tree
    #[serde(default)]
    pub mount: MountConfig,

    /// Diagnostic logging
    #[serde(default)]
    pub log: LogConfig,
}

/// Control channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Well-known channel name
    pub endpoint: String,

    /// Largest accepted frame payload
    pub max_frame_bytes: usize,

    /// Second-connection behaviour
    pub busy_policy: BusyPolicy,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            busy_policy: BusyPolicy::default(),
        }
    }
}

/// Namespace settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    /// Bulk-load manifest read at startup
    pub manifest: Option<PathBuf>,

    /// Write retention policy for projected writes
    pub write_retention: WriteRetention,

    /// Largest file a retained write may produce
    pub max_file_bytes: usize,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            manifest: None,
            write_retention: WriteRetention::default(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

/// Access logging and alerting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Directory for the rolling JSON access log
    pub log_dir: Option<PathBuf>,

    /// Per-path alert suppression window in seconds
    pub alert_throttle_secs: u64,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            alert_throttle_secs: 5,
        }
    }
}

impl AccessConfig {
    /// Alert throttle window as a [`Duration`].
    #[must_use]
    pub const fn alert_throttle(&self) -> Duration {
        Duration::from_secs(self.alert_throttle_secs)
    }
}

/// Control client behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connection attempts before giving up
    pub attempts: u32,

    /// Fixed delay between attempts in milliseconds
    pub retry_delay_ms: u64,

    /// Bound on a single connect attempt in milliseconds
    pub connect_timeout_ms: u64,

    /// Bound on the wait for a response in milliseconds
    pub response_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay_ms: 2_000,
            connect_timeout_ms: 5_000,
            response_timeout_ms: 30_000,
        }
    }
}

/// Kernel mount of the decoy tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    /// Existing directory to mount on; needs a build with the `fuse` feature
    pub mountpoint: Option<PathBuf>,
}

/// Diagnostic logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Default configuration file location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the platform has no config directory.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::config("failed to determine config directory"))?;
        Ok(dir.join("honeyfs").join("config.toml"))
    }

    /// Loads and validates configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read, is not valid
    /// TOML, or fails [`validate`](Self::validate).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| Error::config(format!("failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Loads `path` if given, else the default location if it exists, else
    /// returns defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an explicitly named or existing file
    /// fails to load.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Ok(default) if default.exists() => Self::load(default),
            _ => Ok(Self::default()),
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.control.endpoint.trim().is_empty() {
            return Err(Error::config("control.endpoint must not be empty"));
        }

        if self.control.max_frame_bytes == 0 {
            return Err(Error::config("control.max_frame_bytes must be greater than 0"));
        }

        if self.control.max_frame_bytes > MAX_FRAME_BYTES_LIMIT {
            return Err(Error::config(format!(
                "control.max_frame_bytes cannot exceed {MAX_FRAME_BYTES_LIMIT}"
            )));
        }

        if self.namespace.max_file_bytes == 0 {
            return Err(Error::config("namespace.max_file_bytes must be greater than 0"));
        }

        if self.client.attempts == 0 {
            return Err(Error::config("client.attempts must be at least 1"));
        }

        if self.client.response_timeout_ms == 0 {
            return Err(Error::config("client.response_timeout_ms must be greater than 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log.level.as_str()) {
            return Err(Error::config(format!(
                "invalid log.level '{}', must be one of: {}",
                self.log.level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }
}
