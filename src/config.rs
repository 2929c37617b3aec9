// FILE: src/config.rs
//! Runtime configuration.
//!
//! Read from `--config <FILE>` or `$XDG_CONFIG_HOME/songfs/config.toml`.
//! Every key is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 1 << 30;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Let other users see the mount.
    pub allow_other: bool,
    pub auto_unmount: bool,
    /// How long the kernel may cache attributes and entries.
    pub attr_ttl_secs: u64,
    /// Largest song a write or truncate may produce, in bytes.
    pub max_file_size: u64,
    pub statfs: StatfsConfig,
}

/// The static figures reported by `statfs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StatfsConfig {
    pub block_size: u32,
    pub blocks: u64,
    pub available: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allow_other: false,
            auto_unmount: true,
            attr_ttl_secs: 1,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            statfs: StatfsConfig::default(),
        }
    }
}

impl Default for StatfsConfig {
    fn default() -> Self {
        Self { block_size: 512, blocks: 20_000, available: 10_000 }
    }
}

impl Config {
    /// Loads `explicit` when given, else the default location if it exists,
    /// else the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => path,
                None => {
                    tracing::debug!("[Config] No config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let text = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("[Config] Loaded {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("songfs").join("config.toml"))
    }

    pub fn attr_ttl(&self) -> Duration {
        Duration::from_secs(self.attr_ttl_secs)
    }
}
