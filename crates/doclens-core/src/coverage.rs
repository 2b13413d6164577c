//! Coverage scanning and reduction.
//!
//! [`CoverageScanner`] drives the per-file pipeline (collect, parse, build,
//! filter) and aggregates the results into a [`ScanReport`]. The report's
//! selection is the base set downstream stages work from: change mapping
//! intersects against it, and [`reduce_selection`] applies the
//! documented-only switch and prunes files left empty, returning `None` when
//! nothing remains to hand to generation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::files::{SourceWalker, WalkError};
use crate::filter::{ScopeConfig, ScopeFilter};
use crate::record::DefTree;
use crate::tree::{TreeBuilder, TreeError};

/// Per-file sets of record indices, keyed by canonicalized source path.
pub type FileSelection = BTreeMap<PathBuf, BTreeSet<usize>>;

// ============================================================================
// Scan Errors
// ============================================================================

/// Errors that can occur during a coverage scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// File collection failed
    #[error("File collection failed: {0}")]
    Walk(#[from] WalkError),

    /// Definition tree construction failed
    #[error("Definition tree construction failed: {0}")]
    Tree(#[from] TreeError),
}

// ============================================================================
// Scan Report
// ============================================================================

/// Aggregated result of one coverage scan.
#[derive(Debug)]
pub struct ScanReport {
    /// Per-file definition trees, keyed by canonicalized path
    pub trees: BTreeMap<PathBuf, DefTree>,
}

impl ScanReport {
    /// The per-file selected index sets. Files whose selection is empty stay
    /// present: their presence marks "scanned", which the change mapper's
    /// added-file fast path relies on. Pruning happens in
    /// [`reduce_selection`].
    pub fn selection(&self) -> FileSelection {
        self.trees
            .iter()
            .map(|(file, tree)| (file.clone(), tree.selected.iter().copied().collect()))
            .collect()
    }

    /// Coverage totals over the selected records.
    pub fn summary(&self) -> CoverageSummary {
        let mut total = 0;
        let mut documented = 0;
        for tree in self.trees.values() {
            for rec in tree.selected_records() {
                total += 1;
                if rec.covered {
                    documented += 1;
                }
            }
        }
        CoverageSummary {
            files: self.trees.len(),
            total,
            documented,
        }
    }
}

/// Coverage totals for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageSummary {
    /// Files scanned
    pub files: usize,
    /// Selected definitions
    pub total: usize,
    /// Selected definitions carrying a docstring
    pub documented: usize,
}

impl CoverageSummary {
    /// Definitions still missing documentation.
    pub fn missing(&self) -> usize {
        self.total - self.documented
    }

    /// Documented share in percent; an empty selection counts as fully
    /// documented.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.documented as f64 * 100.0 / self.total as f64
        }
    }
}

// ============================================================================
// Coverage Scanner
// ============================================================================

/// Runs the collect-parse-build-filter pipeline over a set of input paths.
pub struct CoverageScanner {
    builder: TreeBuilder,
    walker: SourceWalker,
    config: ScopeConfig,
}

impl CoverageScanner {
    /// Create a scanner with the given scope rules and extra directory
    /// exclusions.
    pub fn new(config: ScopeConfig, extra_excludes: Vec<String>) -> Result<Self, ScanError> {
        Ok(Self {
            builder: TreeBuilder::new(config.clone())?,
            walker: SourceWalker::with_excludes(extra_excludes),
            config,
        })
    }

    /// Scan the inputs into per-file definition trees.
    ///
    /// A file that fails to read or parse is skipped with a warning; the
    /// scan continues with the remaining files.
    pub fn scan(&mut self, inputs: &[PathBuf]) -> Result<ScanReport, ScanError> {
        let files = self.walker.collect(inputs)?;
        info!("Scanning {} Python files", files.len());

        let filter = ScopeFilter::new(&self.config);
        let mut trees = BTreeMap::new();
        for file in files {
            let mut tree = match self.builder.build_file(&file) {
                Ok(tree) => tree,
                Err(e) => {
                    warn!("Skipping {}: {}", file.display(), e);
                    continue;
                }
            };
            filter.apply(&mut tree);
            trees.insert(file, tree);
        }

        Ok(ScanReport { trees })
    }
}

// ============================================================================
// Reduction
// ============================================================================

/// Apply the documented-only switch and prune files whose set becomes empty.
///
/// With `only_covered` set, the run is restricted to definitions that already
/// carry documentation (a refresh pass over existing docstrings); otherwise
/// every selected definition stays. Returns `None` when no file retains any
/// records, the normal "nothing to do" terminal state.
pub fn reduce_selection(
    selection: FileSelection,
    report: &ScanReport,
    only_covered: bool,
) -> Option<FileSelection> {
    let mut reduced = FileSelection::new();
    for (file, indices) in selection {
        let Some(tree) = report.trees.get(&file) else {
            continue;
        };
        let kept: BTreeSet<usize> = indices
            .into_iter()
            .filter(|&i| i < tree.records.len() && (!only_covered || tree.records[i].covered))
            .collect();
        if !kept.is_empty() {
            reduced.insert(file, kept);
        }
    }
    if reduced.is_empty() {
        None
    } else {
        Some(reduced)
    }
}
