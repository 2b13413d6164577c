//! DocLens CLI - Docstring coverage analysis and generation for Python
//!
//! A command-line interface for measuring docstring coverage, narrowing it
//! to a git change set, and generating the missing docstrings.
//!
//! # Usage
//!
//! ```bash
//! # Report coverage for a source tree
//! doclens check src/
//!
//! # List definitions touched since the main branch
//! doclens diff
//!
//! # Generate and write docstrings for staged changes
//! doclens annotate --staged
//!
//! # Write a default local configuration
//! doclens init
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use doclens_config::ConfigLoader;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;
mod progress;

/// DocLens - Docstring coverage and generation for Python
#[derive(Parser, Debug)]
#[command(name = "doclens")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Repository root (defaults to the nearest ancestor of the inputs
    /// containing .git or pyproject.toml)
    #[arg(long, short = 'R', global = true, env = "DOCLENS_REPO")]
    repo: Option<PathBuf>,

    /// Path to configuration file (replaces the local config layer)
    #[arg(long, short = 'c', global = true, env = "DOCLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report docstring coverage for a source tree
    Check(commands::check::CheckArgs),

    /// List the definitions touched by a git change set
    Diff(commands::diff::DiffArgs),

    /// Generate and write missing docstrings
    Annotate(commands::annotate::AnnotateArgs),

    /// Write a default local configuration file
    Init(commands::init::InitArgs),
}

/// Log level from the config file's [logging] section, best effort. Any
/// config error here is surfaced later by the command's own load.
fn configured_log_level(global: &GlobalOptions) -> Level {
    let root = commands::resolve_repo_root(global.repo.as_deref(), &[])
        .unwrap_or_else(|_| PathBuf::from("."));
    let config = ConfigLoader::new()
        .load(&root, global.config.as_deref(), None)
        .unwrap_or_default();
    config.logging.level.parse().unwrap_or(Level::INFO)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = if cli.global.quiet {
        Level::ERROR
    } else if cli.global.verbose {
        Level::DEBUG
    } else {
        configured_log_level(&cli.global)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Execute the command
    match cli.command {
        Commands::Check(args) => commands::check::execute(args, cli.global).await,
        Commands::Diff(args) => commands::diff::execute(args, cli.global).await,
        Commands::Annotate(args) => commands::annotate::execute(args, cli.global).await,
        Commands::Init(args) => commands::init::execute(args, cli.global).await,
    }
}
