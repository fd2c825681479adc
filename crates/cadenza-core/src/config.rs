//! Player configuration.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, Result};

/// File name looked up inside the platform config directory.
const CONFIG_FILE: &str = "config.json";

/// Tunables for the player control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Interval between progress timer fires, in milliseconds.
    pub progress_interval_ms: u64,
    /// Capacity of the landing buffer for incoming bytes.
    pub buffer_capacity: usize,
    /// Resume automatically when an interruption ends with a resume hint.
    pub resume_after_interruption: bool,
    /// Pause when the current output route disappears.
    pub pause_on_route_loss: bool,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: 100,
            buffer_capacity: 64 * 1024,
            resume_after_interruption: true,
            pause_on_route_loss: true,
            log_filter: "cadenza=info,cadenza_audio=info,cadenza_core=info".to_string(),
        }
    }
}

impl PlayerConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from the platform config directory, or fall back to defaults.
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Location of the config file in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "cadenza", "Cadenza")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.progress_interval_ms == 0 {
            return Err(Error::Config(
                "progress_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(Error::Config(
                "buffer_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub const fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PlayerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.progress_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PlayerConfig = serde_json::from_str(r#"{"progress_interval_ms": 250}"#).unwrap();
        assert_eq!(config.progress_interval_ms, 250);
        assert_eq!(config.buffer_capacity, 64 * 1024);
        assert!(config.resume_after_interruption);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = PlayerConfig {
            progress_interval_ms: 0,
            ..PlayerConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = PlayerConfig::load("/definitely/not/here/config.json");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
