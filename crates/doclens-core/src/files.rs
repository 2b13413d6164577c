//! Source file collection.
//!
//! Resolves the input path set (files or directories) into the list of
//! Python sources to analyze. Directories are walked with gitignore
//! semantics via `ignore::WalkBuilder`; a `.doclensignore` file adds custom
//! exclusions with the same syntax. Package initializer files
//! (`__init__.py`) never participate.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use thiserror::Error;
use tracing::debug;

/// Supported source extensions.
pub const PYTHON_EXTENSIONS: &[&str] = &["py", "pyi"];

/// Directory names excluded from walking in addition to ignore files.
const DEFAULT_EXCLUDES: &[&str] = &[".tox", ".venv", "venv", ".git", ".hg"];

// ============================================================================
// Walk Errors
// ============================================================================

/// Errors that can occur while collecting source files.
#[derive(Debug, Error)]
pub enum WalkError {
    /// An explicitly given file does not carry a supported extension
    #[error("Not a Python source file: {}", .0.display())]
    UnsupportedFile(PathBuf),

    /// Nothing to analyze under any of the inputs
    #[error("No Python source files found under the given paths")]
    NoSources,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Source Walker
// ============================================================================

/// Collects Python source files from a set of input paths.
pub struct SourceWalker {
    extra_excludes: Vec<String>,
}

impl SourceWalker {
    pub fn new() -> Self {
        Self::with_excludes(Vec::new())
    }

    /// Add configured directory names (or glob patterns) to the built-in
    /// exclusions.
    pub fn with_excludes(extra_excludes: Vec<String>) -> Self {
        Self { extra_excludes }
    }

    /// Resolve the input paths into a sorted, canonicalized, de-duplicated
    /// file list.
    ///
    /// Explicit file inputs must carry a supported extension; directory
    /// inputs are walked. An empty result is an error: the caller has
    /// nothing to analyze and should say so rather than silently succeed.
    pub fn collect(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>, WalkError> {
        let glob_set = self.build_exclude_glob_set();
        let mut files = Vec::new();

        for input in inputs {
            let input = input.canonicalize().map_err(WalkError::Io)?;
            if input.is_file() {
                if !is_python_source(&input) {
                    return Err(WalkError::UnsupportedFile(input));
                }
                if !is_package_initializer(&input) {
                    files.push(input);
                }
            } else {
                self.walk_directory(&input, &glob_set, &mut files);
            }
        }

        // Sort for deterministic ordering
        files.sort();
        files.dedup();

        if files.is_empty() {
            return Err(WalkError::NoSources);
        }
        Ok(files)
    }

    /// Walk one directory, respecting ignore files:
    /// - `.gitignore` / global gitignore / `.git/info/exclude`
    /// - `.doclensignore` (custom exclusions for DocLens)
    fn walk_directory(&self, directory: &Path, glob_set: &globset::GlobSet, files: &mut Vec<PathBuf>) {
        let walker = WalkBuilder::new(directory)
            .follow_links(false)
            .hidden(true) // Skip hidden files/directories
            .git_ignore(true) // Respect .gitignore
            .git_global(true) // Respect global gitignore
            .git_exclude(true) // Respect .git/info/exclude
            .add_custom_ignore_filename(".doclensignore") // Respect .doclensignore
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Error walking directory: {}", e);
                    continue;
                }
            };

            // Skip directories - we only want files
            let file_type = match entry.file_type() {
                Some(ft) => ft,
                None => continue,
            };
            if !file_type.is_file() {
                continue;
            }

            let path = entry.path();
            if !is_python_source(path) || is_package_initializer(path) {
                continue;
            }

            // Check exclude patterns beyond .gitignore/.doclensignore
            let rel_path = path
                .strip_prefix(directory)
                .unwrap_or(path)
                .to_string_lossy();
            if glob_set.is_match(rel_path.as_ref()) {
                continue;
            }

            files.push(path.to_path_buf());
        }
    }

    /// Build a glob set from the built-in and configured exclusions. Plain
    /// names are treated as directory names anywhere under the walk root.
    fn build_exclude_glob_set(&self) -> globset::GlobSet {
        let mut builder = globset::GlobSetBuilder::new();
        let names = DEFAULT_EXCLUDES
            .iter()
            .map(|s| s.to_string())
            .chain(self.extra_excludes.iter().cloned());
        for name in names {
            let pattern = if name.contains('/') || name.contains('*') {
                name
            } else {
                format!("**/{name}/**")
            };
            if let Ok(glob) = globset::Glob::new(&pattern) {
                builder.add(glob);
            }
        }
        builder
            .build()
            .unwrap_or_else(|_| globset::GlobSet::empty())
    }
}

impl Default for SourceWalker {
    fn default() -> Self {
        Self::new()
    }
}

/// True when the path carries a recognized Python source extension.
pub fn is_python_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| PYTHON_EXTENSIONS.contains(&ext))
}

fn is_package_initializer(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| stem == "__init__")
}
