//! Init command - Write a default local configuration

use anyhow::{bail, Context, Result};
use clap::Args;
use doclens_config::ConfigLoader;

use super::{print_info, resolve_repo_root};
use crate::GlobalOptions;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration file
    #[arg(long, short = 'f')]
    force: bool,
}

/// Execute the init command
pub async fn execute(args: InitArgs, global: GlobalOptions) -> Result<()> {
    let repo_root = resolve_repo_root(global.repo.as_deref(), &[])?;
    let loader = ConfigLoader::new();
    let path = loader.local_config_path(&repo_root);

    if path.exists() && !args.force {
        bail!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        );
    }

    let written = loader
        .init_local(&repo_root)
        .context("Failed to write configuration")?;
    print_info(&format!("Created {}", written.display()), global.quiet);
    Ok(())
}
