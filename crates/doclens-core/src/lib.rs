//! DocLens Core - Docstring coverage analysis using tree-sitter AST parsing
//!
//! This crate provides the core functionality for coverage analysis:
//! - Tree-sitter parsing for Python sources
//! - Definition tree construction (modules, classes, functions)
//! - Scope filtering (visibility, nesting, decorator rules)
//! - Source file collection with gitignore-aware walking
//! - Coverage scanning and reduction for downstream generation

// Implemented modules
pub mod coverage;
pub mod files;
pub mod filter;
pub mod parser;
pub mod record;
pub mod tree;

// Re-exports for convenience
pub use coverage::{
    CoverageScanner, CoverageSummary, FileSelection, ScanError, ScanReport, reduce_selection,
};
pub use files::{SourceWalker, WalkError, PYTHON_EXTENSIONS};
pub use filter::{ScopeConfig, ScopeFilter};
pub use parser::{ParserError, PythonParser};
pub use record::{DefKind, DefRecord, DefTree};
pub use tree::{TreeBuilder, TreeError};
