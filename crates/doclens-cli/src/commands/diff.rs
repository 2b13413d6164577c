//! Diff command - List definitions touched by a git change set

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use doclens_core::CoverageScanner;
use doclens_git::{Baseline, ChangeMapper, GitRepo};
use tracing::debug;

use super::{
    display_path, load_config, print_info, resolve_repo_root, scan_inputs, select_baseline,
    to_scope_config, FilterOpts,
};
use crate::progress::{finish_spinner, spinner};
use crate::GlobalOptions;

/// Arguments for the diff command
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Files or directories to scan (defaults to the repository root)
    paths: Vec<PathBuf>,

    /// Branch to compare against (defaults to the configured target branch)
    #[arg(long, short = 't')]
    target_branch: Option<String>,

    /// Compare staged changes against HEAD instead of a branch
    #[arg(long)]
    staged: bool,

    #[command(flatten)]
    filter: FilterOpts,
}

/// Execute the diff command
pub async fn execute(args: DiffArgs, global: GlobalOptions) -> Result<()> {
    let repo_root = resolve_repo_root(global.repo.as_deref(), &args.paths)?;

    let mut overrides = args.filter.to_overrides();
    overrides.target_branch = args.target_branch.clone();
    overrides.run_staged = args.staged.then_some(true);
    let config = load_config(&global, &repo_root, Some(&overrides))?;

    let repo = GitRepo::open(&repo_root)
        .with_context(|| format!("No git repository at {}", repo_root.display()))?;
    let baseline = select_baseline(&config);
    if let Baseline::Branch(name) = &baseline {
        repo.verify_branch(name)
            .with_context(|| format!("Cannot diff against '{}'", name))?;
    }

    let inputs = scan_inputs(&args.paths, &repo_root);
    debug!("Mapping changes for {} input path(s)", inputs.len());

    let pb = spinner("Scanning Python sources...", global.quiet);
    let mut scanner = CoverageScanner::new(to_scope_config(&config), config.analysis.exclude.clone())
        .context("Failed to set up the scanner")?;
    let report = scanner.scan(&inputs).context("Scan failed")?;
    finish_spinner(pb, &format!("Scanned {} file(s)", report.trees.len()));

    let pb = spinner("Mapping changed lines...", global.quiet);
    let mapper = ChangeMapper::new(&repo, baseline);
    let changed = mapper
        .map_changes(&report, &report.selection())
        .context("Change mapping failed")?;
    let touched: usize = changed.values().map(|set| set.len()).sum();
    finish_spinner(pb, &format!("{} definition(s) touched", touched));

    if touched == 0 {
        print_info("No definitions touched by the change set.", global.quiet);
        return Ok(());
    }

    if !global.quiet {
        for (file, indices) in &changed {
            if indices.is_empty() {
                continue;
            }
            let Some(tree) = report.trees.get(file) else {
                continue;
            };
            println!("{}", display_path(file, &repo_root));
            for &idx in indices {
                let rec = &tree.records[idx];
                let line = rec.line.map(|l| l.to_string()).unwrap_or_default();
                let marker = if rec.covered { "" } else { "  (undocumented)" };
                println!("  {:>5}  {} {}{}", line, rec.kind.as_str(), rec.path, marker);
            }
        }
    }

    Ok(())
}
