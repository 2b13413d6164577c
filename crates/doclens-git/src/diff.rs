//! Unified diff parsing.
//!
//! Turns patch text into per-line change records carrying old and new line
//! numbers, then reduces those records to the set of line numbers touched
//! by the change.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static HUNK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hunk header pattern")
});

/// Errors from diff interpretation.
#[derive(Debug, Error)]
pub enum DiffError {
    /// A non-context record carried no line number on either side
    #[error("Change could not be resolved to a line number: {0:?}")]
    Unresolved(String),
}

/// How one patch line relates to the two sides of the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Added,
    Removed,
}

/// One line of a hunk, with its position on whichever sides it exists on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineChange {
    /// 1-based position in the baseline version, absent for added lines
    pub old_line: Option<usize>,
    /// 1-based position in the current version, absent for removed lines
    pub new_line: Option<usize>,
    pub kind: LineKind,
    /// Line content without the leading marker
    pub text: String,
}

/// Walk a unified diff and emit a change record per hunk line.
///
/// Each `@@` header resets the line counters from its captured start
/// positions. Context lines advance both counters, added lines only the new
/// one, removed lines only the old one. File headers (`---`/`+++`),
/// everything before the first hunk, and lines with any other leading
/// character are ignored without advancing either counter.
pub fn parse_patch(patch: &str) -> Vec<LineChange> {
    let mut changes = Vec::new();
    let mut old_line: Option<usize> = None;
    let mut new_line: Option<usize> = None;

    for line in patch.lines() {
        if let Some(caps) = HUNK_RE.captures(line) {
            old_line = caps.get(1).and_then(|m| m.as_str().parse().ok());
            new_line = caps.get(3).and_then(|m| m.as_str().parse().ok());
            continue;
        }
        if line.starts_with("---") || line.starts_with("+++") {
            continue;
        }
        let (Some(old), Some(new)) = (old_line, new_line) else {
            // Preamble before the first hunk header
            continue;
        };
        match line.chars().next() {
            Some(' ') => {
                changes.push(LineChange {
                    old_line: Some(old),
                    new_line: Some(new),
                    kind: LineKind::Context,
                    text: line[1..].to_string(),
                });
                old_line = Some(old + 1);
                new_line = Some(new + 1);
            }
            Some('+') => {
                changes.push(LineChange {
                    old_line: None,
                    new_line: Some(new),
                    kind: LineKind::Added,
                    text: line[1..].to_string(),
                });
                new_line = Some(new + 1);
            }
            Some('-') => {
                changes.push(LineChange {
                    old_line: Some(old),
                    new_line: None,
                    kind: LineKind::Removed,
                    text: line[1..].to_string(),
                });
                old_line = Some(old + 1);
            }
            _ => {}
        }
    }
    changes
}

/// Reduce change records to the set of touched line numbers.
///
/// Context records and records whose text is blank are dropped. Remaining
/// records contribute their new-side position when present, otherwise the
/// old-side one.
pub fn changed_lines(changes: &[LineChange]) -> Result<BTreeSet<usize>, DiffError> {
    let mut lines = BTreeSet::new();
    for change in changes {
        if change.kind == LineKind::Context {
            continue;
        }
        if change.text.trim().is_empty() {
            continue;
        }
        let line = change
            .new_line
            .or(change.old_line)
            .ok_or_else(|| DiffError::Unresolved(change.text.clone()))?;
        lines.insert(line);
    }
    Ok(lines)
}
