//! Definition record model.
//!
//! One [`DefRecord`] per syntactic definition site (module, class, function,
//! async function). Records for one file form a tree reconstructable from
//! `level` and visit order; the flat per-file list owns the records, and
//! `parent` is an index into that list, never a second owner.

use std::path::PathBuf;

use serde::Serialize;

// ============================================================================
// Definition Kinds
// ============================================================================

/// Kind of a documentable definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefKind {
    /// The file-level module record
    Module,
    /// `class` definition
    Class,
    /// `def` function or method
    Function,
    /// `async def` function or method
    AsyncFunction,
}

impl DefKind {
    /// Get the string representation used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            DefKind::Module => "module",
            DefKind::Class => "class",
            DefKind::Function => "function",
            DefKind::AsyncFunction => "async function",
        }
    }

    /// True for `def` and `async def` definitions.
    pub fn is_callable(&self) -> bool {
        matches!(self, DefKind::Function | DefKind::AsyncFunction)
    }
}

// ============================================================================
// Definition Record
// ============================================================================

/// One definition site with its coverage and location metadata.
#[derive(Debug, Clone, Serialize)]
pub struct DefRecord {
    /// Identifier, or the file base name for the module-level record
    pub name: String,

    /// Fully-qualified key from file root to this definition.
    /// The module boundary joins with `:`, nested scopes with `.`
    /// (e.g. `sample.py:Outer.method`).
    pub path: String,

    /// Definition kind
    pub kind: DefKind,

    /// Depth in the containment stack (0 = module record)
    pub level: usize,

    /// 1-based source line where the definition begins; `None` is never
    /// matched by change mapping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,

    /// Number of source lines the definition occupies, measured on the raw
    /// definition text (before docstring stripping)
    pub span: usize,

    /// True iff a non-empty docstring is attached
    pub covered: bool,

    /// Cleaned docstring text, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,

    /// Definition source with the docstring lines removed; `None` for
    /// module records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// True iff this is a function whose immediate parent is a function
    pub nested_function: bool,

    /// True iff this is a class nested inside any class or function
    pub nested_class: bool,

    /// Index of the enclosing record in the file's record list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,

    /// Source file path
    pub file: PathBuf,
}

impl DefRecord {
    /// The half-open line interval `[start, start + span)` this definition
    /// occupies, or `None` when no line number is known.
    pub fn extent(&self) -> Option<(usize, usize)> {
        self.line.map(|start| (start, start + self.span))
    }

    /// True when the 1-based `line` falls inside this record's extent.
    pub fn contains_line(&self, line: usize) -> bool {
        match self.extent() {
            Some((start, end)) => start <= line && line < end,
            None => false,
        }
    }
}

// ============================================================================
// Definition Tree
// ============================================================================

/// The per-file product of tree building: the flat record list in pre-order
/// visit order, plus the indices currently selected by scope filtering.
///
/// Filtering narrows `selected`; it never removes records, so `parent`
/// indices stay valid for the life of the tree.
#[derive(Debug, Clone, Serialize)]
pub struct DefTree {
    /// Source file path
    pub file: PathBuf,

    /// All records, pre-order depth-first
    pub records: Vec<DefRecord>,

    /// Indices into `records` currently in scope, ascending
    pub selected: Vec<usize>,
}

impl DefTree {
    /// Create a tree with every record selected.
    pub fn new(file: PathBuf, records: Vec<DefRecord>) -> Self {
        let selected = (0..records.len()).collect();
        Self {
            file,
            records,
            selected,
        }
    }

    /// Iterate the currently selected records.
    pub fn selected_records(&self) -> impl Iterator<Item = &DefRecord> {
        self.selected.iter().map(|&i| &self.records[i])
    }

    /// Number of selected records.
    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }
}
