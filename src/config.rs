// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.4
// Author: Lukas Bower
// Date Modified: 2027-08-14

//! Boot configuration: hardware family, framebuffer geometry and the trust
//! anchor for image validation.
//!
//! Loaded once at init from a TOML file; the `WPRBOOT_CONF` environment
//! variable overrides the default path. A global copy is kept behind a
//! `RwLock` so the boot-command dispatcher and diagnostics read the same
//! values.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

use crate::hal::{HwFamily, MemoryLayout};

/// Default configuration path.
pub const DEFAULT_CONF_PATH: &str = "/srv/wprboot/boot.toml";
/// Environment variable overriding the configuration path.
pub const CONF_PATH_ENV: &str = "WPRBOOT_CONF";

/// Errors produced by config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {0}")]
    Read(PathBuf),
    /// The file is not valid TOML or misses required fields.
    #[error("failed to parse config: {0}")]
    Parse(String),
    /// The trust anchor is not 32 hex-encoded bytes.
    #[error("malformed verifying key")]
    BadKey,
    /// The global config lock is poisoned.
    #[error("config lock poisoned")]
    LockPoisoned,
    /// No configuration has been loaded yet.
    #[error("config not loaded")]
    NotLoaded,
}

/// Boot configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootConfig {
    /// Hardware family the HAL back-end is selected for.
    pub family: HwFamily,
    /// Total device memory size in bytes.
    pub fb_size: u64,
    /// Bytes reserved at the top of device memory.
    #[serde(default)]
    pub reserved_top: u64,
    /// Hex-encoded Ed25519 verifying key accepted as the trust anchor.
    pub verifying_key: String,
}

impl BootConfig {
    /// Load from `path`.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|_| ConfigError::Read(path.to_path_buf()))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from `WPRBOOT_CONF`, falling back to [`DEFAULT_CONF_PATH`].
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONF_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONF_PATH));
        Self::from_path(&path)
    }

    /// Decoded trust anchor bytes.
    pub fn verifying_key_bytes(&self) -> Result<[u8; 32], ConfigError> {
        let bytes = hex::decode(&self.verifying_key).map_err(|_| ConfigError::BadKey)?;
        bytes.try_into().map_err(|_| ConfigError::BadKey)
    }

    /// Memory layout derived from the configured geometry.
    #[must_use]
    pub fn memory_layout(&self) -> MemoryLayout {
        MemoryLayout { fb_base: 0, fb_size: self.fb_size, reserved_top: self.reserved_top }
    }
}

static CONFIG: Lazy<RwLock<Option<BootConfig>>> = Lazy::new(|| RwLock::new(None));

/// Replace the global boot configuration.
pub fn set_config(cfg: BootConfig) -> Result<(), ConfigError> {
    let mut guard = CONFIG.write().map_err(|_| ConfigError::LockPoisoned)?;
    *guard = Some(cfg);
    Ok(())
}

/// Get a clone of the current configuration.
pub fn get_config() -> Result<BootConfig, ConfigError> {
    CONFIG
        .read()
        .map_err(|_| ConfigError::LockPoisoned)?
        .clone()
        .ok_or(ConfigError::NotLoaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_roundtrip() {
        let cfg = BootConfig {
            family: HwFamily::Ga10x,
            fb_size: 0x10_0000,
            reserved_top: 0x2000,
            verifying_key: hex::encode([9u8; 32]),
        };
        let text = toml::to_string(&cfg).unwrap();
        let back: BootConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, cfg);
        assert_eq!(back.verifying_key_bytes().unwrap(), [9u8; 32]);
    }

    #[test]
    fn short_key_rejected() {
        let cfg = BootConfig {
            family: HwFamily::Tu11x,
            fb_size: 0x10_0000,
            reserved_top: 0,
            verifying_key: "abcd".into(),
        };
        assert!(matches!(cfg.verifying_key_bytes(), Err(ConfigError::BadKey)));
    }
}
