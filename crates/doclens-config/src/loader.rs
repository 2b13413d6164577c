//! Layered configuration loading.
//!
//! Four layers, later wins field by field:
//!
//! 1. built-in defaults;
//! 2. global `~/.doclens/config.toml`;
//! 3. local `.doclens/config.toml`, or the `[tool.doclens]` table of
//!    `pyproject.toml` when no local file exists (kebab-case keys accepted);
//! 4. CLI overrides.
//!
//! An explicitly passed config path replaces layer 3.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;
use crate::{
    AnalysisConfig, ConfigOverrides, DocLensConfig, GenerationConfig, GitConfig, LoggingConfig,
    RewriteConfig, ScopeConfig,
};

/// Loads and layers DocLens configuration files.
pub struct ConfigLoader {
    global_config_dir: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            global_config_dir: None,
        }
    }

    /// Use an explicit global directory instead of `~/.doclens`. Test seam.
    pub fn with_global_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(dir.into()),
        }
    }

    /// Path of the global config file.
    pub fn global_config_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.global_dir()?.join("config.toml"))
    }

    /// Path of the workspace-local config file.
    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(".doclens").join("config.toml")
    }

    /// Load the layered configuration for `workspace_root`, apply
    /// `overrides`, and validate the result.
    pub fn load(
        &self,
        workspace_root: &Path,
        explicit: Option<&Path>,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<DocLensConfig, ConfigError> {
        let mut config = DocLensConfig::default();

        if let Some(global) = self.load_global()? {
            config = merge_configs(config, global);
        }

        let local = match explicit {
            Some(path) => Some(load_config_file(path)?),
            None => self.load_local(workspace_root)?,
        };
        if let Some(local) = local {
            config = merge_configs(config, local);
        }

        if let Some(overrides) = overrides {
            config.apply_overrides(overrides);
        }

        config.validate()?;
        Ok(config)
    }

    /// Write a default global config file if none exists.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let path = self.global_config_path()?;
        if !path.exists() {
            save_config_file(&DocLensConfig::default(), &path)?;
        }
        Ok(path)
    }

    /// Write a default local config file, overwriting any existing one.
    pub fn init_local(&self, workspace_root: &Path) -> Result<PathBuf, ConfigError> {
        let path = self.local_config_path(workspace_root);
        save_config_file(&DocLensConfig::default(), &path)?;
        Ok(path)
    }

    fn global_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.global_config_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::home_dir()
                .map(|home| home.join(".doclens"))
                .ok_or(ConfigError::NoHomeDir),
        }
    }

    fn load_global(&self) -> Result<Option<DocLensConfig>, ConfigError> {
        let path = self.global_config_path()?;
        if !path.exists() {
            return Ok(None);
        }
        debug!("Loading global config from {}", path.display());
        Ok(Some(load_config_file(&path)?))
    }

    /// The local layer: `.doclens/config.toml` when present, otherwise the
    /// `[tool.doclens]` table of `pyproject.toml`.
    fn load_local(&self, workspace_root: &Path) -> Result<Option<DocLensConfig>, ConfigError> {
        let path = self.local_config_path(workspace_root);
        if path.exists() {
            debug!("Loading local config from {}", path.display());
            return Ok(Some(load_config_file(&path)?));
        }
        load_pyproject(workspace_root)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn load_pyproject(workspace_root: &Path) -> Result<Option<DocLensConfig>, ConfigError> {
    let path = workspace_root.join("pyproject.toml");
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path).map_err(|e| ConfigError::read_file(&path, e))?;
    let value: toml::Value =
        toml::from_str(&content).map_err(|e| ConfigError::parse_toml(&path, e))?;
    let Some(table) = value.get("tool").and_then(|tool| tool.get("doclens")) else {
        return Ok(None);
    };
    debug!("Loading [tool.doclens] from {}", path.display());
    let config: DocLensConfig = normalize_keys(table.clone())
        .try_into()
        .map_err(|e| ConfigError::parse_toml(&path, e))?;
    Ok(Some(config))
}

/// Rewrite kebab-case keys to snake_case, recursively.
fn normalize_keys(value: toml::Value) -> toml::Value {
    match value {
        toml::Value::Table(table) => toml::Value::Table(
            table
                .into_iter()
                .map(|(key, value)| (key.replace('-', "_"), normalize_keys(value)))
                .collect(),
        ),
        other => other,
    }
}

fn load_config_file(path: &Path) -> Result<DocLensConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

fn save_config_file(config: &DocLensConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

// Field-by-field merges. A field set away from its default in the overlay
// wins; an untouched field keeps the base value. Partial files therefore
// layer per field, not per section.

fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

fn merge_configs(base: DocLensConfig, overlay: DocLensConfig) -> DocLensConfig {
    DocLensConfig {
        scope: merge_scope(base.scope, overlay.scope),
        analysis: merge_analysis(base.analysis, overlay.analysis),
        git: merge_git(base.git, overlay.git),
        generation: merge_generation(base.generation, overlay.generation),
        rewrite: merge_rewrite(base.rewrite, overlay.rewrite),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn merge_scope(base: ScopeConfig, overlay: ScopeConfig) -> ScopeConfig {
    let default = ScopeConfig::default();
    ScopeConfig {
        ignore_module: pick(
            base.ignore_module,
            overlay.ignore_module,
            default.ignore_module,
        ),
        ignore_magic: pick(base.ignore_magic, overlay.ignore_magic, default.ignore_magic),
        ignore_private: pick(
            base.ignore_private,
            overlay.ignore_private,
            default.ignore_private,
        ),
        ignore_semiprivate: pick(
            base.ignore_semiprivate,
            overlay.ignore_semiprivate,
            default.ignore_semiprivate,
        ),
        ignore_init_method: pick(
            base.ignore_init_method,
            overlay.ignore_init_method,
            default.ignore_init_method,
        ),
        ignore_nested_classes: pick(
            base.ignore_nested_classes,
            overlay.ignore_nested_classes,
            default.ignore_nested_classes,
        ),
        ignore_nested_functions: pick(
            base.ignore_nested_functions,
            overlay.ignore_nested_functions,
            default.ignore_nested_functions,
        ),
        ignore_property_decorators: pick(
            base.ignore_property_decorators,
            overlay.ignore_property_decorators,
            default.ignore_property_decorators,
        ),
        ignore_property_setters: pick(
            base.ignore_property_setters,
            overlay.ignore_property_setters,
            default.ignore_property_setters,
        ),
        ignore_overloaded_functions: pick(
            base.ignore_overloaded_functions,
            overlay.ignore_overloaded_functions,
            default.ignore_overloaded_functions,
        ),
    }
}

fn merge_analysis(base: AnalysisConfig, overlay: AnalysisConfig) -> AnalysisConfig {
    let default = AnalysisConfig::default();
    AnalysisConfig {
        include_only_covered: pick(
            base.include_only_covered,
            overlay.include_only_covered,
            default.include_only_covered,
        ),
        exclude: pick(base.exclude, overlay.exclude, default.exclude),
    }
}

fn merge_git(base: GitConfig, overlay: GitConfig) -> GitConfig {
    let default = GitConfig::default();
    GitConfig {
        run_on_diff: pick(base.run_on_diff, overlay.run_on_diff, default.run_on_diff),
        run_staged: pick(base.run_staged, overlay.run_staged, default.run_staged),
        target_branch: pick(
            base.target_branch,
            overlay.target_branch,
            default.target_branch,
        ),
    }
}

fn merge_generation(base: GenerationConfig, overlay: GenerationConfig) -> GenerationConfig {
    let default = GenerationConfig::default();
    GenerationConfig {
        provider: pick(base.provider, overlay.provider, default.provider),
        model: pick(base.model, overlay.model, default.model),
        style: pick(base.style, overlay.style, default.style),
        base_url: pick(base.base_url, overlay.base_url, default.base_url),
        api_key_env: pick(base.api_key_env, overlay.api_key_env, default.api_key_env),
        timeout_secs: pick(
            base.timeout_secs,
            overlay.timeout_secs,
            default.timeout_secs,
        ),
        max_retries: pick(base.max_retries, overlay.max_retries, default.max_retries),
    }
}

fn merge_rewrite(base: RewriteConfig, overlay: RewriteConfig) -> RewriteConfig {
    let default = RewriteConfig::default();
    RewriteConfig {
        cleanup: pick(base.cleanup, overlay.cleanup, default.cleanup),
        convert: pick(base.convert, overlay.convert, default.convert),
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    let default = LoggingConfig::default();
    LoggingConfig {
        level: pick(base.level, overlay.level, default.level),
    }
}
