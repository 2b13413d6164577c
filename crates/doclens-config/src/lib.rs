//! DocLens configuration.
//!
//! Layered TOML configuration: built-in defaults, then the global
//! `~/.doclens/config.toml`, then the workspace-local `.doclens/config.toml`
//! (falling back to the `[tool.doclens]` table of `pyproject.toml`), then
//! CLI overrides. Later layers win field by field; see [`ConfigLoader`].

pub mod error;
pub mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Root configuration for DocLens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocLensConfig {
    pub scope: ScopeConfig,
    pub analysis: AnalysisConfig,
    pub git: GitConfig,
    pub generation: GenerationConfig,
    pub rewrite: RewriteConfig,
    pub logging: LoggingConfig,
}

impl DocLensConfig {
    /// Apply CLI overrides on top of the loaded configuration. Last wins.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(v) = overrides.ignore_magic {
            self.scope.ignore_magic = v;
        }
        if let Some(v) = overrides.ignore_private {
            self.scope.ignore_private = v;
        }
        if let Some(v) = overrides.ignore_semiprivate {
            self.scope.ignore_semiprivate = v;
        }
        if let Some(v) = overrides.ignore_nested_classes {
            self.scope.ignore_nested_classes = v;
        }
        if let Some(v) = overrides.ignore_nested_functions {
            self.scope.ignore_nested_functions = v;
        }
        if let Some(v) = overrides.ignore_property_decorators {
            self.scope.ignore_property_decorators = v;
        }
        if let Some(v) = overrides.ignore_property_setters {
            self.scope.ignore_property_setters = v;
        }
        if let Some(v) = overrides.ignore_overloaded_functions {
            self.scope.ignore_overloaded_functions = v;
        }
        if let Some(v) = overrides.include_only_covered {
            self.analysis.include_only_covered = v;
        }
        if let Some(v) = overrides.run_on_diff {
            self.git.run_on_diff = v;
        }
        if let Some(v) = overrides.run_staged {
            self.git.run_staged = v;
        }
        if let Some(branch) = &overrides.target_branch {
            self.git.target_branch = branch.clone();
        }
        if let Some(provider) = overrides.provider {
            self.generation.provider = provider;
        }
        if let Some(model) = &overrides.model {
            self.generation.model = model.clone();
        }
        if let Some(style) = overrides.style {
            self.generation.style = style;
        }
    }

    /// Validate cross-field rules that serde cannot enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rewrite.convert && self.generation.style == DocStyle::Sphinx {
            return Err(ConfigError::ValidationError(
                "docconvert cannot target the sphinx style; disable rewrite.convert or pick \
                 a google/numpy/epytext/rest style"
                    .to_string(),
            ));
        }
        if self.generation.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "generation.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Switches narrowing which definitions are considered for documentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Drop the module-level record
    pub ignore_module: bool,
    /// Skip dunder-named methods other than the constructor
    pub ignore_magic: bool,
    /// Skip names with two leading underscores
    pub ignore_private: bool,
    /// Skip names with one leading underscore
    pub ignore_semiprivate: bool,
    /// Skip `__init__`
    pub ignore_init_method: bool,
    /// Collapse nested classes and everything beneath them
    pub ignore_nested_classes: bool,
    /// Restrict the selection to nested functions only
    pub ignore_nested_functions: bool,
    /// Skip property getters, setters, and deleters
    pub ignore_property_decorators: bool,
    /// Skip property setters
    pub ignore_property_setters: bool,
    /// Skip `@overload` definitions
    pub ignore_overloaded_functions: bool,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            ignore_module: true,
            ignore_magic: false,
            ignore_private: false,
            ignore_semiprivate: false,
            ignore_init_method: true,
            ignore_nested_classes: false,
            ignore_nested_functions: false,
            ignore_property_decorators: false,
            ignore_property_setters: false,
            ignore_overloaded_functions: false,
        }
    }
}

/// Settings for the coverage scan itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Restrict the run to already-documented definitions
    pub include_only_covered: bool,
    /// Extra directory names to skip, added to the built-in exclusions
    pub exclude: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            include_only_covered: false,
            exclude: Vec::new(),
        }
    }
}

/// Settings for change-scoped runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Narrow the run to definitions touched since `target_branch`
    pub run_on_diff: bool,
    /// Compare the staged index against HEAD instead of a branch
    pub run_staged: bool,
    pub target_branch: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            run_on_diff: false,
            run_staged: false,
            target_branch: "main".to_string(),
        }
    }
}

/// Settings for the generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: GenProvider,
    pub model: String,
    pub style: DocStyle,
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenProvider::Openai,
            model: "gpt-5-nano".to_string(),
            style: DocStyle::Google,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

/// Settings for the rewrite post-processing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Run `black` over rewritten files
    pub cleanup: bool,
    /// Run `docconvert` to normalize docstrings to the configured style
    pub convert: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            cleanup: true,
            convert: true,
        }
    }
}

/// Logging defaults, overridden by `--verbose`/`--quiet`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Docstring style emitted by generation and targeted by conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStyle {
    Sphinx,
    Google,
    Numpy,
    Epytext,
    Rest,
}

impl DocStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocStyle::Sphinx => "sphinx",
            DocStyle::Google => "google",
            DocStyle::Numpy => "numpy",
            DocStyle::Epytext => "epytext",
            DocStyle::Rest => "rest",
        }
    }

    /// True when the style documents constructor arguments at the class
    /// level, so a class and its `__init__` share one coverage verdict.
    pub fn constructor_documents_class(&self) -> bool {
        matches!(self, DocStyle::Google)
    }
}

impl fmt::Display for DocStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DocStyle {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sphinx" => Ok(DocStyle::Sphinx),
            "google" => Ok(DocStyle::Google),
            "numpy" => Ok(DocStyle::Numpy),
            "epytext" => Ok(DocStyle::Epytext),
            "rest" => Ok(DocStyle::Rest),
            other => Err(ConfigError::ValidationError(format!(
                "unknown docstring style '{other}' (expected sphinx, google, numpy, epytext, or rest)"
            ))),
        }
    }
}

/// Backing service for docstring generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenProvider {
    Openai,
}

impl GenProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenProvider::Openai => "openai",
        }
    }
}

impl fmt::Display for GenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GenProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(GenProvider::Openai),
            other => Err(ConfigError::ValidationError(format!(
                "unknown generation provider '{other}' (expected openai)"
            ))),
        }
    }
}

impl Default for GenProvider {
    fn default() -> Self {
        GenProvider::Openai
    }
}

impl Default for DocStyle {
    fn default() -> Self {
        DocStyle::Google
    }
}

/// CLI-side overrides, one `Option` per overridable field.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub ignore_magic: Option<bool>,
    pub ignore_private: Option<bool>,
    pub ignore_semiprivate: Option<bool>,
    pub ignore_nested_classes: Option<bool>,
    pub ignore_nested_functions: Option<bool>,
    pub ignore_property_decorators: Option<bool>,
    pub ignore_property_setters: Option<bool>,
    pub ignore_overloaded_functions: Option<bool>,
    pub include_only_covered: Option<bool>,
    pub run_on_diff: Option<bool>,
    pub run_staged: Option<bool>,
    pub target_branch: Option<String>,
    pub provider: Option<GenProvider>,
    pub model: Option<String>,
    pub style: Option<DocStyle>,
}
