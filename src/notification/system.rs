//! Notifier backed by the console and platform helper programs.
//!
//! Delivery always prints a console banner. Sound and desktop
//! notifications are launched as detached child processes so the
//! countdown task never waits on them.

use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use super::config::NotificationConfig;
use super::error::NotificationError;
use super::Notifier;

/// Default alert sound on macOS.
const MACOS_DEFAULT_SOUND: &str = "/System/Library/Sounds/Glass.aiff";

/// Width of the console banner rule.
const BANNER_WIDTH: usize = 50;

/// An external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl HelperCommand {
    fn new(program: &str, args: impl IntoIterator<Item = String>) -> Self {
        Self {
            program: program.to_string(),
            args: args.into_iter().collect(),
        }
    }

    /// Launches the program without waiting for it.
    fn spawn_detached(&self) -> Result<(), NotificationError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| {
                if source.kind() == io::ErrorKind::NotFound {
                    NotificationError::CommandNotFound(self.program.clone())
                } else {
                    NotificationError::CommandFailed {
                        command: self.program.clone(),
                        source,
                    }
                }
            })?;

        let program = self.program.clone();
        std::thread::spawn(move || match child.wait() {
            Ok(status) if !status.success() => debug!(%program, %status, "helper exited with failure"),
            Ok(_) => {}
            Err(e) => debug!(%program, error = %e, "failed to wait for helper"),
        });
        Ok(())
    }
}

/// What the sound channel should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundAction {
    /// Write BEL to the terminal
    Bell,
    /// Run a player program
    Play(HelperCommand),
}

/// Chooses the sound action for `os` (as in [`std::env::consts::OS`]).
#[must_use]
pub fn sound_action(os: &str, custom_sound: Option<&Path>) -> SoundAction {
    let custom = custom_sound.map(|path| path.display().to_string());
    match (os, custom) {
        ("macos", custom) => SoundAction::Play(HelperCommand::new(
            "afplay",
            [custom.unwrap_or_else(|| MACOS_DEFAULT_SOUND.to_string())],
        )),
        ("windows", None) => SoundAction::Play(HelperCommand::new(
            "powershell",
            [
                "-NoProfile".to_string(),
                "-Command".to_string(),
                "[console]::beep(1000,500)".to_string(),
            ],
        )),
        ("windows", Some(path)) => SoundAction::Play(HelperCommand::new(
            "powershell",
            [
                "-NoProfile".to_string(),
                "-Command".to_string(),
                format!(
                    "(New-Object Media.SoundPlayer '{}').PlaySync()",
                    powershell_quote(&path)
                ),
            ],
        )),
        (_, Some(path)) => SoundAction::Play(HelperCommand::new("paplay", [path])),
        (_, None) => SoundAction::Bell,
    }
}

/// Builds the desktop notification command for `os`, if the platform has one.
#[must_use]
pub fn desktop_command(os: &str, title: &str, message: &str) -> Option<HelperCommand> {
    match os {
        "linux" | "freebsd" | "openbsd" | "netbsd" => Some(HelperCommand::new(
            "notify-send",
            [title.to_string(), message.to_string()],
        )),
        "macos" => Some(HelperCommand::new(
            "osascript",
            [
                "-e".to_string(),
                format!(
                    "display notification \"{}\" with title \"{}\"",
                    applescript_quote(message),
                    applescript_quote(title)
                ),
            ],
        )),
        "windows" => Some(HelperCommand::new(
            "powershell",
            [
                "-NoProfile".to_string(),
                "-Command".to_string(),
                format!(
                    "Add-Type -AssemblyName System.Windows.Forms; \
                     $n = New-Object System.Windows.Forms.NotifyIcon; \
                     $n.Icon = [System.Drawing.SystemIcons]::Information; \
                     $n.Visible = $true; \
                     $n.ShowBalloonTip(5000, '{}', '{}', 'Info'); \
                     Start-Sleep -Seconds 5; $n.Dispose()",
                    powershell_quote(title),
                    powershell_quote(message)
                ),
            ],
        )),
        _ => None,
    }
}

fn applescript_quote(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn powershell_quote(text: &str) -> String {
    text.replace('\'', "''")
}

/// Formats the console banner.
#[must_use]
pub fn banner(title: &str, message: &str) -> String {
    let rule = "!".repeat(BANNER_WIDTH);
    format!("\n{rule}\n{title}\n{message}\n{rule}")
}

// ============================================================================
// SystemNotifier
// ============================================================================

/// Notifier for interactive use.
#[derive(Debug, Clone, Default)]
pub struct SystemNotifier {
    config: NotificationConfig,
}

impl SystemNotifier {
    #[must_use]
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    fn show_banner(&self, title: &str, message: &str) -> Result<(), NotificationError> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", banner(title, message)).map_err(NotificationError::Console)?;
        stdout.flush().map_err(NotificationError::Console)
    }

    fn play_sound(&self) -> Result<(), NotificationError> {
        let custom = self.config.custom_sound_path.as_deref();
        if let Some(path) = custom {
            if !path.exists() {
                return Err(NotificationError::SoundFileNotFound(path.to_path_buf()));
            }
        }
        match sound_action(std::env::consts::OS, custom) {
            SoundAction::Bell => {
                let mut stdout = io::stdout().lock();
                write!(stdout, "\x07").map_err(NotificationError::Console)?;
                stdout.flush().map_err(NotificationError::Console)
            }
            SoundAction::Play(command) => command.spawn_detached(),
        }
    }

    fn show_desktop(&self, title: &str, message: &str) -> Result<(), NotificationError> {
        let os = std::env::consts::OS;
        desktop_command(os, title, message)
            .ok_or_else(|| NotificationError::Unsupported(os.to_string()))?
            .spawn_detached()
    }
}

impl Notifier for SystemNotifier {
    fn deliver(&self, title: &str, message: &str) {
        if let Err(e) = self.show_banner(title, message) {
            warn!(error = %e, "console notification failed");
        }
        if self.config.sound_enabled {
            if let Err(e) = self.play_sound() {
                warn!(error = %e, "sound notification failed");
            }
        }
        if self.config.notification_enabled {
            if let Err(e) = self.show_desktop(title, message) {
                warn!(error = %e, "desktop notification failed");
            }
        }
    }
}
