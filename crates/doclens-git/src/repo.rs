//! Git repository access.
//!
//! git is invoked as a subprocess; nothing here links against libgit. The
//! [`DiffSource`] trait is the seam the change mapper works through, with
//! [`GitRepo`] as the production implementation.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

// ============================================================================
// Git Errors
// ============================================================================

/// Errors from git invocation.
#[derive(Debug, Error)]
pub enum GitError {
    /// The path is not inside a git work tree
    #[error("Not a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    /// The configured comparison branch does not exist
    #[error("Comparison branch does not exist: {0}")]
    MissingBranch(String),

    /// git could not be started
    #[error("Failed to run git: {0}")]
    Spawn(std::io::Error),

    /// git ran and reported failure
    #[error("{command} failed: {stderr}")]
    Command { command: String, stderr: String },
}

// ============================================================================
// Change Classification
// ============================================================================

/// Per-file change classification parsed from `--name-status` output.
///
/// Codes read in the baseline-to-current direction: `Added` means the file
/// exists on the current (staged) side and not in the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Deleted,
    Modified,
    Renamed,
    TypeChanged,
}

impl ChangeKind {
    /// Parse a name-status code. Rename and copy codes carry a similarity
    /// score suffix (`R087`); only the leading letter matters.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.chars().next()? {
            'A' => Some(ChangeKind::Added),
            'D' => Some(ChangeKind::Deleted),
            'M' => Some(ChangeKind::Modified),
            'R' => Some(ChangeKind::Renamed),
            'T' => Some(ChangeKind::TypeChanged),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Modified => "modified",
            ChangeKind::Renamed => "renamed",
            ChangeKind::TypeChanged => "type changed",
        }
    }
}

/// One changed file relative to the baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub kind: ChangeKind,
    /// Repo-relative path on the current side (the rename target for
    /// renamed files)
    pub path: PathBuf,
    /// Repo-relative pre-rename path, for renamed files
    pub old_path: Option<PathBuf>,
}

// ============================================================================
// Baseline
// ============================================================================

/// The revision the staged snapshot is compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Baseline {
    /// A named branch
    Branch(String),
    /// The last commit, so only staged work counts as changed
    Head,
}

impl Baseline {
    pub fn reference(&self) -> &str {
        match self {
            Baseline::Branch(name) => name,
            Baseline::Head => "HEAD",
        }
    }
}

// ============================================================================
// Diff Source
// ============================================================================

/// Repository operations the change mapper depends on.
pub trait DiffSource {
    /// Repository root, for resolving repo-relative change paths.
    fn root(&self) -> &Path;

    /// Stage everything, normalizing untracked and modified state into one
    /// comparable snapshot. Invoked once before diffing.
    fn stage_all(&self) -> Result<(), GitError>;

    /// List files changed between the baseline and the staged snapshot.
    fn changed_files(&self, baseline: &Baseline) -> Result<Vec<ChangedFile>, GitError>;

    /// Unified diff text for exactly one file against the baseline.
    fn file_patch(&self, baseline: &Baseline, path: &Path) -> Result<String, GitError>;
}

// ============================================================================
// Git Repository
// ============================================================================

/// A git work tree addressed by its root directory.
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    /// Resolve the repository containing `path`.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(path)
            .output()
            .map_err(GitError::Spawn)?;
        if !output.status.success() {
            return Err(GitError::NotARepository(path.to_path_buf()));
        }
        let raw = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        let root = raw.canonicalize().unwrap_or(raw);
        debug!("Opened git repository at {}", root.display());
        Ok(Self { root })
    }

    /// Fail unless the named branch resolves to a commit.
    pub fn verify_branch(&self, name: &str) -> Result<(), GitError> {
        let output = Command::new("git")
            .args(["rev-parse", "--verify", "--quiet", name])
            .current_dir(&self.root)
            .output()
            .map_err(GitError::Spawn)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(GitError::MissingBranch(name.to_string()))
        }
    }

    fn run(&self, mut cmd: Command) -> Result<String, GitError> {
        let command = render_command(&cmd);
        let output = cmd.output().map_err(GitError::Spawn)?;
        if !output.status.success() {
            return Err(GitError::Command {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn git(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.root);
        cmd
    }
}

impl DiffSource for GitRepo {
    fn root(&self) -> &Path {
        &self.root
    }

    fn stage_all(&self) -> Result<(), GitError> {
        let mut cmd = self.git();
        cmd.args(["add", "-A"]);
        self.run(cmd)?;
        Ok(())
    }

    fn changed_files(&self, baseline: &Baseline) -> Result<Vec<ChangedFile>, GitError> {
        let mut cmd = self.git();
        cmd.args(["diff", "--cached", "--name-status", "-M", baseline.reference()]);
        let listing = self.run(cmd)?;
        Ok(parse_name_status(&listing))
    }

    fn file_patch(&self, baseline: &Baseline, path: &Path) -> Result<String, GitError> {
        let mut cmd = self.git();
        cmd.args(["diff", "--cached", "-M", baseline.reference(), "--"]);
        cmd.arg(path);
        self.run(cmd)
    }
}

/// Parse `--name-status` output into changed-file entries. Unrecognized
/// codes are skipped.
pub fn parse_name_status(listing: &str) -> Vec<ChangedFile> {
    let mut changes = Vec::new();
    for line in listing.lines() {
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split('\t');
        let code = match parts.next() {
            Some(c) => c,
            None => continue,
        };
        let kind = match ChangeKind::from_code(code) {
            Some(k) => k,
            None => {
                debug!("Skipping unrecognized change code {:?}", code);
                continue;
            }
        };
        let first = parts.next();
        let second = parts.next();
        let (old_path, path) = match (kind, first, second) {
            (ChangeKind::Renamed, Some(old), Some(new)) => {
                (Some(PathBuf::from(old)), PathBuf::from(new))
            }
            (_, Some(p), _) => (None, PathBuf::from(p)),
            _ => continue,
        };
        changes.push(ChangedFile {
            kind,
            path,
            old_path,
        });
    }
    changes
}

fn render_command(cmd: &Command) -> String {
    let args: Vec<String> = cmd
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    format!("git {}", args.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_change_codes() {
        assert_eq!(ChangeKind::from_code("A"), Some(ChangeKind::Added));
        assert_eq!(ChangeKind::from_code("D"), Some(ChangeKind::Deleted));
        assert_eq!(ChangeKind::from_code("M"), Some(ChangeKind::Modified));
        assert_eq!(ChangeKind::from_code("R100"), Some(ChangeKind::Renamed));
        assert_eq!(ChangeKind::from_code("T"), Some(ChangeKind::TypeChanged));
        assert_eq!(ChangeKind::from_code("X"), None);
        assert_eq!(ChangeKind::from_code(""), None);
    }

    #[test]
    fn test_parse_name_status() {
        let listing = "M\tsrc/app.py\nA\tsrc/new.py\nD\tsrc/gone.py\nR087\tsrc/old_name.py\tsrc/new_name.py\nT\tsrc/link.py\n";
        let changes = parse_name_status(listing);
        assert_eq!(
            changes,
            vec![
                ChangedFile {
                    kind: ChangeKind::Modified,
                    path: PathBuf::from("src/app.py"),
                    old_path: None,
                },
                ChangedFile {
                    kind: ChangeKind::Added,
                    path: PathBuf::from("src/new.py"),
                    old_path: None,
                },
                ChangedFile {
                    kind: ChangeKind::Deleted,
                    path: PathBuf::from("src/gone.py"),
                    old_path: None,
                },
                ChangedFile {
                    kind: ChangeKind::Renamed,
                    path: PathBuf::from("src/new_name.py"),
                    old_path: Some(PathBuf::from("src/old_name.py")),
                },
                ChangedFile {
                    kind: ChangeKind::TypeChanged,
                    path: PathBuf::from("src/link.py"),
                    old_path: None,
                },
            ]
        );
    }

    // The staged snapshot is always the "current" side of the comparison:
    // a file reported `A` exists in the index and not in the baseline, with
    // no perspective swap needed downstream.
    #[test]
    fn test_added_means_added_on_the_current_side() {
        let changes = parse_name_status("A\tbrand_new.py\n");
        assert_eq!(changes[0].kind, ChangeKind::Added);
        assert_eq!(changes[0].path, PathBuf::from("brand_new.py"));
    }

    #[test]
    fn test_parse_name_status_skips_unknown_codes() {
        let listing = "C075\tsrc/a.py\tsrc/b.py\nM\tsrc/c.py\n";
        let changes = parse_name_status(listing);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
    }

    #[test]
    fn test_baseline_reference() {
        assert_eq!(Baseline::Branch("main".to_string()).reference(), "main");
        assert_eq!(Baseline::Head.reference(), "HEAD");
    }
}
