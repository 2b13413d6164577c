//! Annotate command - Generate and write missing docstrings

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use doclens_config::{ConfigError, DocStyle, GenProvider};
use doclens_core::{reduce_selection, CoverageScanner};
use doclens_git::{Baseline, ChangeMapper, GitRepo};
use doclens_gen::{Commenter, OpenAiClient, Rewriter};
use tracing::debug;

use super::{
    display_path, load_config, print_info, resolve_repo_root, scan_inputs, select_baseline,
    to_openai_config, to_scope_config, FilterOpts,
};
use crate::progress::{finish_progress, finish_spinner, progress_bar, spinner};
use crate::GlobalOptions;

fn parse_style(s: &str) -> Result<DocStyle, String> {
    s.parse().map_err(|e: ConfigError| e.to_string())
}

fn parse_provider(s: &str) -> Result<GenProvider, String> {
    s.parse().map_err(|e: ConfigError| e.to_string())
}

/// Arguments for the annotate command
#[derive(Args, Debug)]
pub struct AnnotateArgs {
    /// Files or directories to process (defaults to the repository root)
    paths: Vec<PathBuf>,

    /// Only process definitions touched by the git change set
    #[arg(long = "diff-only", short = 'D')]
    diff_only: bool,

    /// Compare staged changes against HEAD instead of a branch
    #[arg(long)]
    staged: bool,

    /// Branch to compare against (defaults to the configured target branch)
    #[arg(long)]
    target_branch: Option<String>,

    /// Generation provider
    #[arg(long, value_parser = parse_provider)]
    provider: Option<GenProvider>,

    /// Model identifier sent to the provider
    #[arg(long)]
    model: Option<String>,

    /// Docstring style to generate (sphinx, google, numpy, epytext, rest)
    #[arg(long, value_parser = parse_style)]
    style: Option<DocStyle>,

    /// Print the generated docstrings without touching any file
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    filter: FilterOpts,
}

/// Execute the annotate command
pub async fn execute(args: AnnotateArgs, global: GlobalOptions) -> Result<()> {
    let repo_root = resolve_repo_root(global.repo.as_deref(), &args.paths)?;

    let mut overrides = args.filter.to_overrides();
    overrides.run_on_diff = args.diff_only.then_some(true);
    overrides.run_staged = args.staged.then_some(true);
    overrides.target_branch = args.target_branch.clone();
    overrides.provider = args.provider;
    overrides.model = args.model.clone();
    overrides.style = args.style;
    let config = load_config(&global, &repo_root, Some(&overrides))?;

    let inputs = scan_inputs(&args.paths, &repo_root);
    let pb = spinner("Scanning Python sources...", global.quiet);
    let mut scanner = CoverageScanner::new(to_scope_config(&config), config.analysis.exclude.clone())
        .context("Failed to set up the scanner")?;
    let report = scanner.scan(&inputs).context("Scan failed")?;
    finish_spinner(pb, &format!("Scanned {} file(s)", report.trees.len()));

    let mut selection = report.selection();

    if config.git.run_on_diff || config.git.run_staged {
        let repo = GitRepo::open(&repo_root)
            .with_context(|| format!("No git repository at {}", repo_root.display()))?;
        let baseline = select_baseline(&config);
        if let Baseline::Branch(name) = &baseline {
            repo.verify_branch(name)
                .with_context(|| format!("Cannot diff against '{}'", name))?;
        }
        let pb = spinner("Mapping changed lines...", global.quiet);
        let mapper = ChangeMapper::new(&repo, baseline);
        selection = mapper
            .map_changes(&report, &selection)
            .context("Change mapping failed")?;
        let touched: usize = selection.values().map(|set| set.len()).sum();
        finish_spinner(pb, &format!("{} definition(s) touched", touched));
    }

    let Some(reduced) = reduce_selection(selection, &report, config.analysis.include_only_covered)
    else {
        print_info("Nothing to document.", global.quiet);
        return Ok(());
    };

    let client =
        OpenAiClient::new(to_openai_config(&config)).context("Failed to set up the generator")?;
    let style = config.generation.style.as_str();
    let commenter = Commenter::new(&client, style);
    let mut rewriter = if args.dry_run {
        None
    } else {
        Some(
            Rewriter::new(config.rewrite.cleanup, config.rewrite.convert, style)
                .context("Failed to set up the rewriter")?,
        )
    };

    debug!(
        "Annotating {} file(s) with model {}",
        reduced.len(),
        config.generation.model
    );
    let pb = progress_bar(reduced.len() as u64, "Generating docstrings...", global.quiet);
    let mut generated = 0usize;
    for (file, indices) in &reduced {
        let Some(tree) = report.trees.get(file) else {
            continue;
        };
        let docs = commenter.comment_file(tree, indices).await;
        generated += docs.len();

        match rewriter.as_mut() {
            Some(rewriter) => {
                rewriter
                    .process(file, &docs)
                    .with_context(|| format!("Failed to rewrite {}", file.display()))?;
            }
            None => print_generated(&display_path(file, &repo_root), &docs, global.quiet),
        }
        if let Some(ref pb) = pb {
            pb.inc(1);
        }
    }
    finish_progress(pb);

    let verb = if args.dry_run { "Generated" } else { "Wrote" };
    print_info(
        &format!(
            "{} {} docstring(s) across {} file(s)",
            verb,
            generated,
            reduced.len()
        ),
        global.quiet,
    );

    Ok(())
}

/// Dry-run output: the docstrings that would be written, per definition.
fn print_generated(file: &str, docs: &BTreeMap<String, String>, quiet: bool) {
    if quiet || docs.is_empty() {
        return;
    }
    println!("{}", file);
    for (name, text) in docs {
        println!("  {}:", name);
        for line in text.lines() {
            println!("    {}", line);
        }
    }
    println!();
}
