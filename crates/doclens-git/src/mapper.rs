//! Change-to-definition mapping.
//!
//! Narrows a scan's file selection down to the definitions whose source
//! extent was actually touched relative to a git baseline.

use std::collections::BTreeSet;
use std::path::PathBuf;

use doclens_core::files::is_python_source;
use doclens_core::{DefTree, FileSelection, ScanReport};
use thiserror::Error;
use tracing::debug;

use crate::diff::{changed_lines, parse_patch, DiffError};
use crate::repo::{Baseline, ChangeKind, DiffSource, GitError};

// ============================================================================
// Mapping Errors
// ============================================================================

/// Errors from change mapping.
#[derive(Debug, Error)]
pub enum MapError {
    /// Git operation failed
    #[error("Git operation failed: {0}")]
    Git(#[from] GitError),

    /// Patch text could not be interpreted
    #[error("Diff interpretation failed: {0}")]
    Diff(#[from] DiffError),

    /// A single-file patch request returned more than one diff entry
    #[error("Expected one diff entry for {}, found {found}", .path.display())]
    AmbiguousDiff { path: PathBuf, found: usize },
}

// ============================================================================
// Change Mapper
// ============================================================================

/// Maps changed files and lines onto the definition records of a scan.
pub struct ChangeMapper<'a, S: DiffSource> {
    source: &'a S,
    baseline: Baseline,
}

impl<'a, S: DiffSource> ChangeMapper<'a, S> {
    pub fn new(source: &'a S, baseline: Baseline) -> Self {
        Self { source, baseline }
    }

    /// Scope a base selection down to the definitions touched since the
    /// baseline.
    ///
    /// Everything is staged first so untracked and modified files land in
    /// one comparable snapshot. Newly added files keep their entire base
    /// record set without consulting patch text. Other changed files keep
    /// the records whose extent contains at least one changed line, module
    /// records excluded. Changed files without a Python source extension,
    /// and files outside the base selection, are dropped.
    pub fn map_changes(
        &self,
        report: &ScanReport,
        base: &FileSelection,
    ) -> Result<FileSelection, MapError> {
        self.source.stage_all()?;
        let changed = self.source.changed_files(&self.baseline)?;
        debug!(
            "{} files changed relative to {}",
            changed.len(),
            self.baseline.reference()
        );

        let mut result = FileSelection::new();
        for change in changed {
            if !is_python_source(&change.path) {
                continue;
            }
            let joined = self.source.root().join(&change.path);
            let abs = joined.canonicalize().unwrap_or(joined);
            let Some(base_indices) = base.get(&abs) else {
                debug!("Changed file {} is outside the scanned set", abs.display());
                continue;
            };
            let Some(tree) = report.trees.get(&abs) else {
                continue;
            };

            if change.kind == ChangeKind::Added {
                // A brand-new file has no baseline side to diff against,
                // so every selected definition counts as changed.
                result.insert(abs, base_indices.clone());
                continue;
            }

            let patch = self.source.file_patch(&self.baseline, &change.path)?;
            let entries = count_diff_entries(&patch);
            if entries > 1 {
                return Err(MapError::AmbiguousDiff {
                    path: abs,
                    found: entries,
                });
            }
            let lines = changed_lines(&parse_patch(&patch))?;
            result.insert(abs, match_lines(tree, base_indices, &lines));
        }
        Ok(result)
    }
}

/// Select the records whose extent contains any changed line.
///
/// Module records span the whole file and would match every change, so
/// only records below the module level participate.
fn match_lines(
    tree: &DefTree,
    base_indices: &BTreeSet<usize>,
    lines: &BTreeSet<usize>,
) -> BTreeSet<usize> {
    let mut matched = BTreeSet::new();
    for &idx in base_indices {
        let Some(record) = tree.records.get(idx) else {
            continue;
        };
        if record.level == 0 {
            continue;
        }
        if lines.iter().any(|&line| record.contains_line(line)) {
            matched.insert(idx);
        }
    }
    matched
}

fn count_diff_entries(patch: &str) -> usize {
    patch
        .lines()
        .filter(|line| line.starts_with("diff --git "))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::ChangedFile;
    use doclens_core::{reduce_selection, DefKind, DefRecord, ScopeConfig, TreeBuilder};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::path::Path;

    struct FakeSource {
        root: PathBuf,
        changes: Vec<ChangedFile>,
        /// Patches keyed by repo-relative path; requesting a missing one
        /// is an error so tests can assert a patch was never fetched
        patches: BTreeMap<PathBuf, String>,
    }

    impl DiffSource for FakeSource {
        fn root(&self) -> &Path {
            &self.root
        }

        fn stage_all(&self) -> Result<(), GitError> {
            Ok(())
        }

        fn changed_files(&self, _baseline: &Baseline) -> Result<Vec<ChangedFile>, GitError> {
            Ok(self.changes.clone())
        }

        fn file_patch(&self, _baseline: &Baseline, path: &Path) -> Result<String, GitError> {
            self.patches.get(path).cloned().ok_or_else(|| GitError::Command {
                command: format!("git diff -- {}", path.display()),
                stderr: "unexpected patch request".to_string(),
            })
        }
    }

    fn change(kind: ChangeKind, path: &str) -> ChangedFile {
        ChangedFile {
            kind,
            path: PathBuf::from(path),
            old_path: None,
        }
    }

    fn record(
        name: &str,
        kind: DefKind,
        level: usize,
        line: usize,
        span: usize,
        parent: Option<usize>,
    ) -> DefRecord {
        DefRecord {
            name: name.to_string(),
            path: name.to_string(),
            kind,
            level,
            line: Some(line),
            span,
            covered: false,
            docstring: None,
            code: None,
            nested_function: false,
            nested_class: false,
            parent,
            file: PathBuf::from("/repo/sample.py"),
        }
    }

    /// Module spanning the file, a class on lines 5-20, a method on
    /// lines 10-15.
    fn probe_tree() -> DefTree {
        DefTree::new(
            PathBuf::from("/repo/sample.py"),
            vec![
                record("sample.py", DefKind::Module, 0, 1, 25, None),
                record("Widget", DefKind::Class, 1, 5, 16, Some(0)),
                record("render", DefKind::Function, 2, 10, 6, Some(1)),
            ],
        )
    }

    fn report_for(trees: Vec<DefTree>) -> ScanReport {
        ScanReport {
            trees: trees.into_iter().map(|t| (t.file.clone(), t)).collect(),
        }
    }

    fn build_tree(path: &str, source: &str) -> DefTree {
        let mut builder = TreeBuilder::new(ScopeConfig::default()).unwrap();
        builder.build(Path::new(path), source).unwrap()
    }

    #[test]
    fn test_line_inside_method_selects_method_and_class() {
        let tree = probe_tree();
        let base: BTreeSet<usize> = [0, 1, 2].into();
        let matched = match_lines(&tree, &base, &BTreeSet::from([12]));
        assert_eq!(matched, BTreeSet::from([1, 2]));
    }

    #[test]
    fn test_line_outside_every_extent_selects_nothing() {
        let tree = probe_tree();
        let base: BTreeSet<usize> = [0, 1, 2].into();
        let matched = match_lines(&tree, &base, &BTreeSet::from([3]));
        assert_eq!(matched, BTreeSet::new());
    }

    #[test]
    fn test_module_record_never_matches() {
        let tree = probe_tree();
        let base: BTreeSet<usize> = [0].into();
        let matched = match_lines(&tree, &base, &BTreeSet::from([12]));
        assert_eq!(matched, BTreeSet::new());
    }

    #[test]
    fn test_added_file_keeps_entire_base_set_without_a_patch() {
        let tree = build_tree("/repo/fresh.py", "def fresh():\n    pass\n");
        let report = report_for(vec![tree]);
        let base = report.selection();

        let source = FakeSource {
            root: PathBuf::from("/repo"),
            changes: vec![change(ChangeKind::Added, "fresh.py")],
            patches: BTreeMap::new(),
        };
        let mapper = ChangeMapper::new(&source, Baseline::Head);
        let mapped = mapper.map_changes(&report, &base).unwrap();

        assert_eq!(mapped, base);
    }

    #[test]
    fn test_modified_file_keeps_only_touched_definitions() {
        let source_text = "\
class Outer:
    def method(self):
        value = 1
        return value
";
        let patch = "\
diff --git a/modified.py b/modified.py
index 1111111..2222222 100644
--- a/modified.py
+++ b/modified.py
@@ -1,4 +1,4 @@
 class Outer:
     def method(self):
-        value = 1
+        value = 2
         return value
";
        let tree = build_tree("/repo/modified.py", source_text);
        let report = report_for(vec![tree]);
        let base = report.selection();

        let source = FakeSource {
            root: PathBuf::from("/repo"),
            changes: vec![change(ChangeKind::Modified, "modified.py")],
            patches: BTreeMap::from([(PathBuf::from("modified.py"), patch.to_string())]),
        };
        let mapper = ChangeMapper::new(&source, Baseline::Branch("main".to_string()));
        let mapped = mapper.map_changes(&report, &base).unwrap();

        // Records are module, Outer, method in visit order; the edit on
        // line 3 lands inside both Outer and method but never the module.
        assert_eq!(
            mapped.get(Path::new("/repo/modified.py")),
            Some(&BTreeSet::from([1, 2]))
        );
    }

    #[test]
    fn test_mixed_change_set_keeps_added_narrows_modified_prunes_untouched() {
        let added = build_tree("/repo/added.py", "def alpha():\n    pass\n\ndef beta():\n    pass\n");
        let modified = build_tree(
            "/repo/modified.py",
            "class Outer:\n    def method(self):\n        value = 1\n        return value\n",
        );
        let untouched = build_tree("/repo/untouched.py", "def quiet():\n    pass\n");
        let report = report_for(vec![added, modified, untouched]);
        let base = report.selection();

        let patch = "\
diff --git a/modified.py b/modified.py
--- a/modified.py
+++ b/modified.py
@@ -1,4 +1,4 @@
 class Outer:
     def method(self):
-        value = 1
+        value = 2
         return value
";
        let source = FakeSource {
            root: PathBuf::from("/repo"),
            changes: vec![
                change(ChangeKind::Added, "added.py"),
                change(ChangeKind::Modified, "modified.py"),
            ],
            patches: BTreeMap::from([(PathBuf::from("modified.py"), patch.to_string())]),
        };
        let mapper = ChangeMapper::new(&source, Baseline::Branch("main".to_string()));
        let mapped = mapper.map_changes(&report, &base).unwrap();

        assert_eq!(
            mapped.get(Path::new("/repo/added.py")),
            base.get(Path::new("/repo/added.py"))
        );
        assert_eq!(
            mapped.get(Path::new("/repo/modified.py")),
            Some(&BTreeSet::from([1, 2]))
        );
        assert_eq!(mapped.get(Path::new("/repo/untouched.py")), None);
    }

    #[test]
    fn test_unchanged_and_non_python_files_are_dropped() {
        let touched = build_tree("/repo/touched.py", "def f():\n    pass\n");
        let untouched = build_tree("/repo/untouched.py", "def g():\n    pass\n");
        let report = report_for(vec![touched, untouched]);
        let base = report.selection();

        let source = FakeSource {
            root: PathBuf::from("/repo"),
            changes: vec![
                change(ChangeKind::Added, "touched.py"),
                change(ChangeKind::Modified, "notes.md"),
            ],
            patches: BTreeMap::new(),
        };
        let mapper = ChangeMapper::new(&source, Baseline::Head);
        let mapped = mapper.map_changes(&report, &base).unwrap();

        let keys: Vec<&PathBuf> = mapped.keys().collect();
        assert_eq!(keys, vec![&PathBuf::from("/repo/touched.py")]);
    }

    #[test]
    fn test_changed_file_outside_the_scan_is_skipped() {
        let report = report_for(vec![]);
        let base = FileSelection::new();

        let source = FakeSource {
            root: PathBuf::from("/repo"),
            changes: vec![change(ChangeKind::Modified, "stray.py")],
            patches: BTreeMap::new(),
        };
        let mapper = ChangeMapper::new(&source, Baseline::Head);
        let mapped = mapper.map_changes(&report, &base).unwrap();
        assert!(mapped.is_empty());
    }

    #[test]
    fn test_multiple_diff_entries_for_one_file_is_fatal() {
        let tree = build_tree("/repo/twice.py", "def f():\n    pass\n");
        let report = report_for(vec![tree]);
        let base = report.selection();

        let patch = "\
diff --git a/twice.py b/twice.py
--- a/twice.py
+++ b/twice.py
@@ -1,1 +1,1 @@
-x
+y
diff --git a/other.py b/other.py
--- a/other.py
+++ b/other.py
@@ -1,1 +1,1 @@
-p
+q
";
        let source = FakeSource {
            root: PathBuf::from("/repo"),
            changes: vec![change(ChangeKind::Modified, "twice.py")],
            patches: BTreeMap::from([(PathBuf::from("twice.py"), patch.to_string())]),
        };
        let mapper = ChangeMapper::new(&source, Baseline::Head);
        let err = mapper.map_changes(&report, &base).unwrap_err();
        assert!(matches!(err, MapError::AmbiguousDiff { found: 2, .. }));
    }

    #[test]
    fn test_mapped_selection_reduces_like_any_other() {
        let tree = build_tree("/repo/fresh.py", "def fresh():\n    pass\n");
        let report = report_for(vec![tree]);
        let base = report.selection();

        let source = FakeSource {
            root: PathBuf::from("/repo"),
            changes: vec![change(ChangeKind::Added, "fresh.py")],
            patches: BTreeMap::new(),
        };
        let mapper = ChangeMapper::new(&source, Baseline::Head);
        let mapped = mapper.map_changes(&report, &base).unwrap();

        // Nothing in the file is documented, so the covered-only reduction
        // has nothing left to run on.
        assert!(reduce_selection(mapped.clone(), &report, true).is_none());
        assert!(reduce_selection(mapped, &report, false).is_some());
    }
}
