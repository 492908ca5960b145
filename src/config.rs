//! Application settings.
//!
//! Settings are read from a JSON file. Missing fields take their defaults,
//! and a missing file means "all defaults". The engine itself never reads
//! settings; they are handed to the notifier and the CLI.
//!
//! ```json
//! {
//!   "sound_enabled": true,
//!   "notification_enabled": true,
//!   "custom_sound_path": null,
//!   "storage_dir": "/home/me/.local/share/cook-timer",
//!   "refresh_interval_ms": 500
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notification::NotificationConfig;

/// Application directory name under the platform data/config dirs.
pub const APP_DIR_NAME: &str = "cook-timer";

/// Allowed range for the CLI redraw period.
pub const REFRESH_INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 100..=5000;

fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("data"))
}

fn default_refresh_interval_ms() -> u64 {
    500
}

/// Errors raised while loading or saving settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// User-facing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Completion channels
    #[serde(flatten)]
    pub notification: NotificationConfig,

    /// Directory holding `timers.json`
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// How often the CLI redraws progress, in milliseconds
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notification: NotificationConfig::default(),
            storage_dir: default_storage_dir(),
            refresh_interval_ms: default_refresh_interval_ms(),
        }
    }
}

impl Settings {
    /// Default settings file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("data"))
            .join("settings.json")
    }

    /// Loads settings from `path`, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let settings: Self =
            serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Writes settings to `path` as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io_error = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_error)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !REFRESH_INTERVAL_RANGE_MS.contains(&self.refresh_interval_ms) {
            return Err(SettingsError::Invalid(format!(
                "refresh_interval_ms must be between {} and {}, got {}",
                REFRESH_INTERVAL_RANGE_MS.start(),
                REFRESH_INTERVAL_RANGE_MS.end(),
                self.refresh_interval_ms
            )));
        }
        if self.storage_dir.as_os_str().is_empty() {
            return Err(SettingsError::Invalid("storage_dir must not be empty".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_refresh_interval_ms(mut self, ms: u64) -> Self {
        self.refresh_interval_ms = ms;
        self
    }

    #[must_use]
    pub fn with_notification(mut self, notification: NotificationConfig) -> Self {
        self.notification = notification;
        self
    }
}
