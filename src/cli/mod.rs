//! CLI module for the cook timer.
//!
//! This module provides the command-line interface:
//! - `commands`: Command definitions using clap derive
//! - `runner`: Drives timers against the store and notifier
//! - `display`: Output formatting and display logic

pub mod commands;
pub mod display;
pub mod runner;

pub use commands::{Cli, Commands, StepsArgs, TimerArgs};
pub use display::{Display, ProgressLine};
pub use runner::Runner;
