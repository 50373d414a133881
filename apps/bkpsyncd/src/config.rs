//! Daemon configuration.
//!
//! Configuration is read from a TOML file given with `--config`. Every field
//! has a default, so a missing file or a partial file is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bkpsync_server::ServerConfig;
use bkpsync_transfer::{DEFAULT_WORKING_EXTENSION, SessionConfig, SweeperConfig};
use serde::{Deserialize, Serialize};

use crate::logging::LogConfig;

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// IP address the WebSocket server binds.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// WebSocket server port (0 = auto-assign).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the date buckets.
    #[serde(default = "default_upload_root")]
    pub upload_root: PathBuf,

    /// Extension of working files.
    #[serde(default = "default_working_extension")]
    pub working_extension: String,

    /// Byte offset of the container's status flag.
    #[serde(default)]
    pub status_offset: usize,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// `[retention]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Delete expired buckets. Idle transfers are forgotten either way.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Buckets older than this many days are deleted.
    #[serde(default = "default_retention_days")]
    pub days: u32,

    /// Seconds between sweeps.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Seconds after which an idle transfer is forgotten (0 = never).
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_upload_root() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_working_extension() -> String {
    DEFAULT_WORKING_EXTENSION.into()
}

fn default_true() -> bool {
    true
}

fn default_retention_days() -> u32 {
    1
}

fn default_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_idle_timeout_secs() -> u64 {
    24 * 60 * 60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            upload_root: default_upload_root(),
            working_extension: default_working_extension(),
            status_offset: 0,
            retention: RetentionConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            days: default_retention_days(),
            interval_secs: default_interval_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, falling back to defaults when no
    /// path is given or the file does not exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.working_extension.is_empty()
            || self.working_extension.contains(['/', '\\', '.'])
        {
            anyhow::bail!("invalid working_extension {:?}", self.working_extension);
        }
        if self.retention.interval_secs == 0 {
            anyhow::bail!("retention.interval_secs must be positive");
        }
        Ok(())
    }

    pub fn server(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind_addr.clone(),
            port: self.port,
        }
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            working_extension: self.working_extension.clone(),
        }
    }

    pub fn sweeper(&self) -> SweeperConfig {
        let idle = self.retention.idle_timeout_secs;
        SweeperConfig {
            purge: self.retention.enabled,
            retention_days: self.retention.days,
            interval: Duration::from_secs(self.retention.interval_secs),
            idle_timeout: (idle > 0).then(|| Duration::from_secs(idle)),
        }
    }
}
