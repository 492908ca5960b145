//! Command definitions for the cook-timer CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Longest countdown accepted on the command line (24 hours).
const MAX_SECONDS: u64 = 24 * 60 * 60;

/// Built-in cooking times used when `timer` gets no `--seconds`.
pub const PRESETS: &[(&str, u64)] = &[
    ("ramyun", 240),
    ("udon", 180),
    ("tteokbokki", 300),
    ("mandu", 480),
    ("egg", 420),
    ("rice", 1200),
    ("tea", 180),
];

/// Looks up a preset cooking time, ignoring case and surrounding spaces.
#[must_use]
pub fn preset_seconds(name: &str) -> Option<u64> {
    let name = name.trim();
    PRESETS
        .iter()
        .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
        .map(|&(_, seconds)| seconds)
}

// ============================================================================
// CLI Structure
// ============================================================================

/// Cooking timer with step-by-step recipes
#[derive(Parser, Debug)]
#[command(
    name = "cook-timer",
    version,
    about = "Cooking timer with step-by-step recipes",
    long_about = "Run cooking countdowns in the terminal.\n\
                  Single timers or multi-step recipes, with pause-free persistence \
                  so an interrupted countdown can be resumed later.",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a single countdown
    Timer(TimerArgs),

    /// Run a multi-step cooking process
    Steps(StepsArgs),

    /// List saved timers
    Saved,

    /// Resume a saved timer or step timer
    Resume {
        /// Id shown by `saved`
        id: String,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Arguments
// ============================================================================

/// Arguments for the timer command
#[derive(Args, Debug, Clone)]
pub struct TimerArgs {
    /// What is being cooked
    #[arg(value_parser = validate_name)]
    pub name: String,

    /// Countdown length in seconds (defaults to the preset for NAME)
    #[arg(
        short,
        long,
        value_parser = clap::value_parser!(u64).range(0..=MAX_SECONDS)
    )]
    pub seconds: Option<u64>,

    /// Keep the countdown in the store so it can be resumed
    #[arg(long)]
    pub save: bool,
}

impl TimerArgs {
    /// Countdown length: `--seconds` if given, otherwise the preset for the name.
    pub fn resolve_seconds(&self) -> Result<u64, String> {
        self.seconds
            .or_else(|| preset_seconds(&self.name))
            .ok_or_else(|| {
                let known: Vec<&str> = PRESETS.iter().map(|(name, _)| *name).collect();
                format!(
                    "no preset for \"{}\"; pass --seconds or use one of: {}",
                    self.name,
                    known.join(", ")
                )
            })
    }
}

/// Arguments for the steps command
#[derive(Args, Debug, Clone)]
pub struct StepsArgs {
    /// Name of the cooking process
    #[arg(value_parser = validate_name)]
    pub name: String,

    /// A step as "description=seconds"; repeat in order
    #[arg(long = "step", required = true, value_parser = parse_step)]
    pub steps: Vec<(String, u64)>,

    /// Keep the process in the store so it can be resumed
    #[arg(long)]
    pub save: bool,
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Validates a food or process name.
///
/// - Must not be blank
/// - Must not exceed 100 characters
fn validate_name(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("name cannot be empty".to_string());
    }
    if trimmed.chars().count() > 100 {
        return Err("name must be at most 100 characters".to_string());
    }
    Ok(trimmed.to_string())
}

/// Parses "description=seconds".
///
/// The last `=` separates the duration, so descriptions may contain `=`.
fn parse_step(s: &str) -> Result<(String, u64), String> {
    let (description, seconds) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected \"description=seconds\", got \"{s}\""))?;
    let description = description.trim();
    if description.is_empty() {
        return Err("step description cannot be empty".to_string());
    }
    let seconds: u64 = seconds
        .trim()
        .parse()
        .map_err(|_| format!("invalid step duration \"{}\"", seconds.trim()))?;
    if seconds > MAX_SECONDS {
        return Err(format!("step duration must be at most {MAX_SECONDS} seconds"));
    }
    Ok((description.to_string(), seconds))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // Cli Tests
    // ------------------------------------------------------------------------

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_no_args() {
            let cli = Cli::parse_from(["cook-timer"]);
            assert!(cli.command.is_none());
            assert!(!cli.verbose);
            assert!(cli.settings.is_none());
        }

        #[test]
        fn test_parse_global_flags() {
            let cli = Cli::parse_from(["cook-timer", "saved", "-v", "--settings", "/tmp/s.json"]);
            assert!(cli.verbose);
            assert_eq!(cli.settings, Some(PathBuf::from("/tmp/s.json")));
            assert!(matches!(cli.command, Some(Commands::Saved)));
        }

        #[test]
        fn test_parse_timer_command() {
            let cli = Cli::parse_from(["cook-timer", "timer", "Mandu", "--seconds", "300", "--save"]);
            match cli.command {
                Some(Commands::Timer(args)) => {
                    assert_eq!(args.name, "Mandu");
                    assert_eq!(args.seconds, Some(300));
                    assert!(args.save);
                }
                _ => panic!("Expected Timer command"),
            }
        }

        #[test]
        fn test_timer_seconds_optional() {
            let cli = Cli::parse_from(["cook-timer", "timer", "Mandu"]);
            match cli.command {
                Some(Commands::Timer(args)) => assert_eq!(args.seconds, None),
                _ => panic!("Expected Timer command"),
            }
        }

        #[test]
        fn test_timer_rejects_too_long() {
            let result = Cli::try_parse_from(["cook-timer", "timer", "Mandu", "-s", "86401"]);
            assert!(result.is_err());
        }

        #[test]
        fn test_parse_steps_command() {
            let cli = Cli::parse_from([
                "cook-timer",
                "steps",
                "Ramyun",
                "--step",
                "boil water=180",
                "--step",
                "add noodles=240",
            ]);
            match cli.command {
                Some(Commands::Steps(args)) => {
                    assert_eq!(args.name, "Ramyun");
                    assert_eq!(
                        args.steps,
                        vec![
                            ("boil water".to_string(), 180),
                            ("add noodles".to_string(), 240)
                        ]
                    );
                    assert!(!args.save);
                }
                _ => panic!("Expected Steps command"),
            }
        }

        #[test]
        fn test_steps_requires_a_step() {
            let result = Cli::try_parse_from(["cook-timer", "steps", "Ramyun"]);
            assert!(result.is_err());
        }

        #[test]
        fn test_parse_resume_command() {
            let cli = Cli::parse_from(["cook-timer", "resume", "abc"]);
            match cli.command {
                Some(Commands::Resume { id }) => assert_eq!(id, "abc"),
                _ => panic!("Expected Resume command"),
            }
        }

        #[test]
        fn test_parse_completions_zsh() {
            let cli = Cli::parse_from(["cook-timer", "completions", "zsh"]);
            match cli.command {
                Some(Commands::Completions { shell }) => {
                    assert_eq!(shell, clap_complete::Shell::Zsh);
                }
                _ => panic!("Expected Completions command"),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Validation Tests
    // ------------------------------------------------------------------------

    // ------------------------------------------------------------------------
    // Preset Tests
    // ------------------------------------------------------------------------

    mod preset_tests {
        use super::*;

        fn timer_args(name: &str, seconds: Option<u64>) -> TimerArgs {
            TimerArgs {
                name: name.to_string(),
                seconds,
                save: false,
            }
        }

        #[test]
        fn test_preset_lookup_ignores_case() {
            assert_eq!(preset_seconds("Ramyun"), Some(240));
            assert_eq!(preset_seconds(" EGG "), Some(420));
            assert_eq!(preset_seconds("pizza"), None);
        }

        #[test]
        fn test_explicit_seconds_win() {
            assert_eq!(timer_args("Ramyun", Some(10)).resolve_seconds(), Ok(10));
            assert_eq!(timer_args("Ramyun", None).resolve_seconds(), Ok(240));
        }

        #[test]
        fn test_unknown_name_needs_seconds() {
            let err = timer_args("Pizza", None).resolve_seconds().unwrap_err();
            assert!(err.contains("--seconds"));
            assert!(err.contains("ramyun"));
        }

        #[test]
        fn test_presets_within_limit() {
            assert!(PRESETS.iter().all(|(_, seconds)| *seconds <= MAX_SECONDS));
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_validate_name() {
            assert_eq!(validate_name("  Bibimbap "), Ok("Bibimbap".to_string()));
            assert!(validate_name("   ").is_err());
            assert!(validate_name(&"a".repeat(101)).is_err());
            assert!(validate_name(&"떡".repeat(100)).is_ok());
        }

        #[test]
        fn test_parse_step() {
            assert_eq!(
                parse_step("boil water=180"),
                Ok(("boil water".to_string(), 180))
            );
            assert_eq!(parse_step("ratio 1=2 = 30"), Ok(("ratio 1=2".to_string(), 30)));
            assert_eq!(parse_step("rest=0"), Ok(("rest".to_string(), 0)));
        }

        #[test]
        fn test_parse_step_errors() {
            assert!(parse_step("boil water").is_err());
            assert!(parse_step("=30").is_err());
            assert!(parse_step("boil=soon").is_err());
            assert!(parse_step("boil=-5").is_err());
            assert!(parse_step("boil=90000").is_err());
        }
    }
}
