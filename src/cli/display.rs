//! Display utilities for the cook-timer CLI.
//!
//! This module provides formatted output for:
//! - Status change messages
//! - The live progress line
//! - Saved record listings
//! - Error messages

use std::io::{self, Write};

use crate::storage::{Loaded, SavedRecord};
use crate::types::{StepEvent, TimerEvent, TimerStatus};

/// Width of the progress bar in characters.
const BAR_WIDTH: usize = 30;

/// ANSI "return to column 0 and clear line".
const CLEAR_LINE: &str = "\r\x1b[2K";

/// One frame of the live progress line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressLine {
    pub label: String,
    pub status: TimerStatus,
    pub remaining: u64,
    pub progress: f64,
}

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows a timer status change.
    pub fn show_timer_event(name: &str, event: &TimerEvent) {
        println!("{CLEAR_LINE}{} {name}", Self::status_marker(event.status));
    }

    /// Shows a step transition.
    pub fn show_step_event(event: &StepEvent, total_steps: usize) {
        match event.step {
            Some(index) => println!(
                "{CLEAR_LINE}{} step {}/{}: {}",
                Self::status_marker(event.status),
                index + 1,
                total_steps,
                event.description
            ),
            None => println!("{CLEAR_LINE}{} all steps", Self::status_marker(event.status)),
        }
    }

    /// Redraws the progress line in place.
    pub fn show_progress(line: &ProgressLine) {
        print!("{CLEAR_LINE}{}", Self::format_progress(line));
        // Best effort: a closed stdout only loses the redraw
        let _ = io::stdout().flush();
    }

    /// Moves past the progress line.
    pub fn finish_progress() {
        println!();
    }

    /// Shows that a record was written to the store.
    pub fn show_saved(id: &str) {
        println!("{CLEAR_LINE}saved as {id}");
        println!("  resume with: cook-timer resume {id}");
    }

    /// Shows a restored record before waiting on it.
    pub fn show_resumed(name: &str, status: TimerStatus) {
        println!("> resumed {name} ({status})");
    }

    /// Lists saved records.
    pub fn show_records(records: &Loaded<SavedRecord>) {
        if records.items.is_empty() && records.rejected.is_empty() {
            println!("No saved timers");
            return;
        }

        for line in Self::format_records(records) {
            println!("{line}");
        }
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("Error: {message}");
    }

    fn status_marker(status: TimerStatus) -> &'static str {
        match status {
            TimerStatus::Ready => "-",
            TimerStatus::Running => ">",
            TimerStatus::Paused => "||",
            TimerStatus::Completed => "*",
            TimerStatus::Cancelled => "[]",
        }
    }

    fn format_records(records: &Loaded<SavedRecord>) -> Vec<String> {
        let mut lines = vec![format!(
            "{:<11} {:<36} {:<10} {:>9}  NAME",
            "KIND", "ID", "STATUS", "REMAINING"
        )];
        for record in records.items.values() {
            lines.push(format!(
                "{:<11} {:<36} {:<10} {:>9}  {}",
                record.kind.as_str(),
                record.id,
                record.status.as_str(),
                Self::format_time(record.remaining),
                record.name
            ));
        }
        for (id, error) in &records.rejected {
            lines.push(format!("{:<11} {:<36} unreadable: {}", "?", id, error));
        }
        lines
    }

    fn format_progress(line: &ProgressLine) -> String {
        format!(
            "{} {:>5.1}% {:>8}  {}",
            Self::progress_bar(line.progress),
            line.progress,
            Self::format_time(line.remaining),
            line.label
        )
    }

    /// Renders `[#####-----]` for a percentage.
    fn progress_bar(progress: f64) -> String {
        let filled = ((progress.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
        format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
    }

    /// Formats seconds as `MM:SS`, or `H:MM:SS` from one hour up.
    fn format_time(total_seconds: u64) -> String {
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        if hours > 0 {
            format!("{hours}:{minutes:02}:{seconds:02}")
        } else {
            format!("{minutes:02}:{seconds:02}")
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
