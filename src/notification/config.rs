//! Notification channel configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Which completion channels are active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Play a sound (or ring the terminal bell) on completion
    #[serde(default = "default_true")]
    pub sound_enabled: bool,

    /// Show a desktop notification on completion
    #[serde(default = "default_true")]
    pub notification_enabled: bool,

    /// Sound file played instead of the platform default
    #[serde(default)]
    pub custom_sound_path: Option<PathBuf>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            notification_enabled: true,
            custom_sound_path: None,
        }
    }
}

impl NotificationConfig {
    /// Console banner only.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            sound_enabled: false,
            notification_enabled: false,
            custom_sound_path: None,
        }
    }

    #[must_use]
    pub fn with_sound(mut self, enabled: bool) -> Self {
        self.sound_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_desktop_notifications(mut self, enabled: bool) -> Self {
        self.notification_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_custom_sound(mut self, path: impl Into<PathBuf>) -> Self {
        self.custom_sound_path = Some(path.into());
        self
    }
}
