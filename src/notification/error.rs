//! Notification error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a single notification channel.
///
/// Channels fail independently; [`super::Notifier::deliver`] logs these and
/// carries on with the remaining channels.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The console banner could not be written.
    #[error("failed to write notification banner: {0}")]
    Console(#[source] io::Error),

    /// The helper program is not installed.
    #[error("notification command not found: {0}")]
    CommandNotFound(String),

    /// The helper program could not be launched.
    #[error("failed to run {command}: {source}")]
    CommandFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The configured custom sound does not exist.
    #[error("sound file not found: {}", .0.display())]
    SoundFileNotFound(PathBuf),

    /// Desktop notifications are not implemented for this platform.
    #[error("desktop notifications are not supported on {0}")]
    Unsupported(String),
}

impl NotificationError {
    /// Returns true if the failure comes from a missing helper program.
    #[must_use]
    pub fn is_missing_command(&self) -> bool {
        matches!(self, Self::CommandNotFound(_))
    }
}
