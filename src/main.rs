//! Cook Timer CLI
//!
//! Runs cooking countdowns in the terminal:
//! - a single timer with a live progress line
//! - a multi-step process, one timer per step
//! - saved countdowns that can be resumed after an interruption

use anyhow::Result;
use clap::{CommandFactory, Parser};

use cook_timer::cli::{Cli, Commands, Display, Runner};
use cook_timer::Settings;

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(cli.verbose);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    let command = match cli.command {
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
            return Ok(());
        }
        Some(command) => command,
        None => {
            // No subcommand: show help
            Cli::command().print_help()?;
            println!();
            return Ok(());
        }
    };

    let settings_path = cli.settings.unwrap_or_else(Settings::default_path);
    let settings = Settings::load(&settings_path)?;
    tracing::debug!(path = %settings_path.display(), "settings loaded");

    let runner = Runner::new(&settings)?;
    match command {
        Commands::Timer(args) => runner.run_timer(&args).await?,
        Commands::Steps(args) => runner.run_steps(&args).await?,
        Commands::Saved => runner.list_saved()?,
        Commands::Resume { id } => runner.resume(&id).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
