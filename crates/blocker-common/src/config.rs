//! Configuration types for Blocker
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `BLOCKER__`-prefixed environment variables (e.g.
//! `BLOCKER__MOUNT__BASE_DIR=/srv/mnt`).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "BLOCKER";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration for Blocker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockerConfig {
    /// Mountpoint configuration
    pub mount: MountConfig,
    /// Device slot pool
    pub devices: DeviceConfig,
    /// Remote state polling
    pub poll: PollConfig,
    /// Static host identity
    pub host: HostConfig,
    /// Logging
    pub logging: LoggingConfig,
}

impl BlockerConfig {
    /// Load configuration from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.mount.base_dir.is_absolute() {
            return Err(ConfigError::Invalid(format!(
                "mount.base_dir must be absolute, got {}",
                self.mount.base_dir.display()
            )));
        }

        if self.devices.letters.is_empty() {
            return Err(ConfigError::Invalid("devices.letters is empty".into()));
        }
        let mut seen = HashSet::new();
        for c in self.devices.letters.chars() {
            if !c.is_ascii_lowercase() {
                return Err(ConfigError::Invalid(format!(
                    "devices.letters contains non-letter {c:?}"
                )));
            }
            if !seen.insert(c) {
                return Err(ConfigError::Invalid(format!(
                    "devices.letters contains {c:?} twice"
                )));
            }
        }

        if self.poll.max_attempts == 0 {
            return Err(ConfigError::Invalid("poll.max_attempts must be positive".into()));
        }

        Ok(())
    }
}

/// Where and how mountpoints are created
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    /// Directory under which per-volume mountpoints are generated
    pub base_dir: PathBuf,
    /// Filesystem type passed to `mount -t`; autodetected when unset
    pub fs_type: Option<String>,
    /// Permission bits for created mountpoints
    pub dir_mode: u32,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("/mnt/blocker"),
            fs_type: None,
            dir_mode: 0o700,
        }
    }
}

/// Local device naming for secondary block volumes
///
/// The default letters f through p follow the range recommended for
/// secondary devices, leaving the primary letters alone.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Legacy device node prefix, also the name sent with attach requests
    pub prefix: String,
    /// Prefix the kernel may remap secondary devices to
    pub remapped_prefix: String,
    /// Ordered slot letters
    pub letters: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            prefix: "/dev/sd".to_string(),
            remapped_prefix: "/dev/xvd".to_string(),
            letters: "fghijklmnop".to_string(),
        }
    }
}

/// Bounded retry for remote state transitions
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Number of describe calls before giving up
    pub max_attempts: u32,
    /// Delay between describe calls in seconds
    pub interval_secs: u64,
}

impl PollConfig {
    /// Delay between attempts
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            interval_secs: 5,
        }
    }
}

/// Statically configured host identity
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub instance_id: Option<String>,
    pub region: Option<String>,
    pub availability_zone: Option<String>,
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace / debug / info / warn / error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
