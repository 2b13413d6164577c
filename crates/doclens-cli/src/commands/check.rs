//! Check command - Docstring coverage reporting

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use doclens_core::CoverageScanner;
use tracing::debug;

use super::{
    display_path, load_config, resolve_repo_root, scan_inputs, to_scope_config, FilterOpts,
};
use crate::progress::{finish_spinner, spinner};
use crate::GlobalOptions;

/// Arguments for the check command
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Files or directories to scan (defaults to the repository root)
    paths: Vec<PathBuf>,

    /// Emit the report as JSON
    #[arg(long)]
    json: bool,

    /// Exit with an error when any selected definition lacks a docstring
    #[arg(long)]
    fail_on_missing: bool,

    #[command(flatten)]
    filter: FilterOpts,
}

/// Execute the check command
pub async fn execute(args: CheckArgs, global: GlobalOptions) -> Result<()> {
    let repo_root = resolve_repo_root(global.repo.as_deref(), &args.paths)?;
    let overrides = args.filter.to_overrides();
    let config = load_config(&global, &repo_root, Some(&overrides))?;

    let inputs = scan_inputs(&args.paths, &repo_root);
    debug!(
        "Scanning {} input path(s) under {}",
        inputs.len(),
        repo_root.display()
    );

    let quiet = global.quiet || args.json;
    let pb = spinner("Scanning Python sources...", quiet);
    let mut scanner = CoverageScanner::new(to_scope_config(&config), config.analysis.exclude.clone())
        .context("Failed to set up the scanner")?;
    let report = scanner.scan(&inputs).context("Scan failed")?;
    let summary = report.summary();
    finish_spinner(pb, &format!("Scanned {} file(s)", summary.files));

    if args.json {
        let mut undocumented = Vec::new();
        for (file, tree) in &report.trees {
            let rel = display_path(file, &repo_root);
            for rec in tree.selected_records().filter(|r| !r.covered) {
                undocumented.push(serde_json::json!({
                    "file": rel,
                    "line": rec.line,
                    "kind": rec.kind.as_str(),
                    "path": rec.path,
                }));
            }
        }
        let json = serde_json::json!({
            "files": summary.files,
            "total": summary.total,
            "documented": summary.documented,
            "missing": summary.missing(),
            "percent": summary.percent(),
            "undocumented": undocumented,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else if !global.quiet {
        if summary.missing() > 0 {
            println!("Missing docstrings:");
            for (file, tree) in &report.trees {
                for rec in tree.selected_records().filter(|r| !r.covered) {
                    let location = match rec.line {
                        Some(line) => format!("{}:{}", display_path(file, &repo_root), line),
                        None => display_path(file, &repo_root),
                    };
                    println!("  {}  {} {}", location, rec.kind.as_str(), rec.path);
                }
            }
            println!();
        }
        println!(
            "{} definitions, {} documented, {} missing ({:.1}% coverage)",
            summary.total,
            summary.documented,
            summary.missing(),
            summary.percent()
        );
    }

    if args.fail_on_missing && summary.missing() > 0 {
        bail!("{} definition(s) missing docstrings", summary.missing());
    }

    Ok(())
}
