//! CLI command implementations
//!
//! This module contains all DocLens CLI command implementations.

pub mod annotate;
pub mod check;
pub mod diff;
pub mod init;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use doclens_config::{ConfigLoader, ConfigOverrides, DocLensConfig};
use doclens_core::ScopeConfig;
use doclens_gen::OpenAiConfig;
use doclens_git::Baseline;
use tracing::debug;

use crate::GlobalOptions;

/// Resolve the repository root: an explicit `-R` wins; otherwise ascend from
/// the first input path (or the current directory) to the nearest ancestor
/// holding a `.git` or `pyproject.toml`.
pub fn resolve_repo_root(explicit: Option<&Path>, inputs: &[PathBuf]) -> Result<PathBuf> {
    if let Some(root) = explicit {
        return root
            .canonicalize()
            .with_context(|| format!("Repository root {} not found", root.display()));
    }

    let start = match inputs.first() {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let start = start
        .canonicalize()
        .with_context(|| format!("Input path {} not found", start.display()))?;
    let origin: PathBuf = if start.is_file() {
        start
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| start.clone())
    } else {
        start
    };

    let mut dir = origin.as_path();
    loop {
        if dir.join(".git").exists() || dir.join("pyproject.toml").exists() {
            debug!("Resolved repository root to {}", dir.display());
            return Ok(dir.to_path_buf());
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return Ok(origin.clone()),
        }
    }
}

/// Load the layered configuration for the resolved root, honoring an
/// explicit --config path and CLI overrides.
pub fn load_config(
    global: &GlobalOptions,
    repo_root: &Path,
    overrides: Option<&ConfigOverrides>,
) -> Result<DocLensConfig> {
    ConfigLoader::new()
        .load(repo_root, global.config.as_deref(), overrides)
        .context("Failed to load configuration")
}

/// The scan inputs: explicit paths when given, the repository root otherwise.
pub fn scan_inputs(paths: &[PathBuf], repo_root: &Path) -> Vec<PathBuf> {
    if paths.is_empty() {
        vec![repo_root.to_path_buf()]
    } else {
        paths.to_vec()
    }
}

/// Convert doclens-config's scope settings to doclens-core's scope rules.
///
/// The constructor-documents-class rule is not a standalone switch: it
/// follows from the configured docstring style.
pub fn to_scope_config(config: &DocLensConfig) -> ScopeConfig {
    let scope = &config.scope;
    ScopeConfig {
        ignore_module: scope.ignore_module,
        ignore_magic: scope.ignore_magic,
        ignore_private: scope.ignore_private,
        ignore_semiprivate: scope.ignore_semiprivate,
        ignore_init_method: scope.ignore_init_method,
        ignore_nested_classes: scope.ignore_nested_classes,
        ignore_nested_functions: scope.ignore_nested_functions,
        ignore_property_decorators: scope.ignore_property_decorators,
        ignore_property_setters: scope.ignore_property_setters,
        ignore_overloaded_functions: scope.ignore_overloaded_functions,
        constructor_documents_class: config.generation.style.constructor_documents_class(),
    }
}

/// Convert the generation section to the OpenAI client configuration.
/// The API key is read from the configured environment variable.
pub fn to_openai_config(config: &DocLensConfig) -> OpenAiConfig {
    OpenAiConfig {
        base_url: config.generation.base_url.clone(),
        api_key: std::env::var(&config.generation.api_key_env).ok(),
        model: config.generation.model.clone(),
        timeout_secs: config.generation.timeout_secs,
        max_retries: config.generation.max_retries,
    }
}

/// The diff baseline implied by configuration: the staged comparison wins
/// over a branch baseline.
pub fn select_baseline(config: &DocLensConfig) -> Baseline {
    if config.git.run_staged {
        Baseline::Head
    } else {
        Baseline::Branch(config.git.target_branch.clone())
    }
}

/// Render a file path relative to the repository root when possible.
pub fn display_path(file: &Path, repo_root: &Path) -> String {
    file.strip_prefix(repo_root)
        .unwrap_or(file)
        .display()
        .to_string()
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}

/// Scope-filter switches shared by the analysis commands. Each flag narrows
/// the selection on top of the configured defaults; an unset flag leaves
/// the configured value alone.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterOpts {
    /// Skip dunder methods other than __init__
    #[arg(long, short = 'm')]
    ignore_magic: bool,

    /// Skip classes nested inside other definitions
    #[arg(long, short = 'C')]
    ignore_nested_classes: bool,

    /// Restrict the run to nested functions
    #[arg(long, short = 'n')]
    ignore_nested_functions: bool,

    /// Skip @overload definitions
    #[arg(long, short = 'O')]
    ignore_overloaded_functions: bool,

    /// Skip names with two leading underscores
    #[arg(long, short = 'p')]
    ignore_private: bool,

    /// Skip property getters, setters, and deleters
    #[arg(long, short = 'P')]
    ignore_property_decorators: bool,

    /// Skip property setters
    #[arg(long, short = 'S')]
    ignore_setters: bool,

    /// Skip names with one leading underscore
    #[arg(long, short = 's')]
    ignore_semiprivate: bool,

    /// Restrict the run to already-documented definitions
    #[arg(long, short = 'o')]
    only_covered: bool,
}

impl FilterOpts {
    /// Convert set flags to config overrides.
    pub fn to_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            ignore_magic: self.ignore_magic.then_some(true),
            ignore_nested_classes: self.ignore_nested_classes.then_some(true),
            ignore_nested_functions: self.ignore_nested_functions.then_some(true),
            ignore_overloaded_functions: self.ignore_overloaded_functions.then_some(true),
            ignore_private: self.ignore_private.then_some(true),
            ignore_property_decorators: self.ignore_property_decorators.then_some(true),
            ignore_property_setters: self.ignore_setters.then_some(true),
            ignore_semiprivate: self.ignore_semiprivate.then_some(true),
            include_only_covered: self.only_covered.then_some(true),
            ..ConfigOverrides::default()
        }
    }
}
