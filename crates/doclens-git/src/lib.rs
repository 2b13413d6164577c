//! DocLens Git - change listing, unified diff parsing, and
//! change-to-definition mapping.
//!
//! Wraps git as a subprocess to answer one question: which definitions in
//! a scanned tree were touched since a baseline revision. The staged index
//! is always the "current" side of the comparison, so callers stage first
//! and the reported change direction never needs flipping.

pub mod diff;
pub mod mapper;
pub mod repo;

pub use diff::{changed_lines, parse_patch, DiffError, LineChange, LineKind};
pub use mapper::{ChangeMapper, MapError};
pub use repo::{Baseline, ChangeKind, ChangedFile, DiffSource, GitError, GitRepo};
