//! Git gateway.
//!
//! Thin, synchronous wrapper over the `git` binary. Every invocation passes
//! the repository root via `current_dir` — there is no process-wide working
//! directory to mutate, so callers can hold repos anywhere.
//!
//! Exit code 0 is success; anything else is failure for that call. A spawn
//! failure (git not installed, permission denied) is folded into the same
//! failure shape: the replay engine treats every flavor identically, one
//! attempt per chunk and move on. Side effects are external and irreversible:
//! a commit that succeeded has mutated history no matter what fails later.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Result, bail};
use tracing::debug;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of staging one path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageOutcome {
    /// The path was staged.
    Staged,
    /// The path does not exist on disk; git was never invoked.
    Missing,
    /// Git was invoked and failed.
    Failed {
        /// Trimmed stderr/stdout from git, or the spawn error.
        detail: String,
    },
}

/// Result of a commit or push.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CmdOutcome {
    /// The command exited 0.
    Success,
    /// The command failed (non-zero exit or spawn error).
    Failed {
        /// Trimmed stderr/stdout from git, or the spawn error.
        detail: String,
    },
}

impl CmdOutcome {
    /// Whether the command exited 0.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

// ---------------------------------------------------------------------------
// Vcs trait
// ---------------------------------------------------------------------------

/// The version-control operations the replay engine drives.
///
/// All operations are blocking; each maps to one external command. The trait
/// exists so the engine can be exercised against a scripted double in tests.
pub trait Vcs {
    /// Stage one repository-relative path for the next commit.
    fn stage(&mut self, path: &str) -> StageOutcome;

    /// Commit whatever is staged with `message`. Committing with nothing
    /// staged is expected to fail in git itself; callers treat that as an
    /// ordinary commit failure.
    fn commit(&mut self, message: &str) -> CmdOutcome;

    /// Push the current branch to its configured remote.
    fn push(&mut self) -> CmdOutcome;
}

// ---------------------------------------------------------------------------
// GitRepo
// ---------------------------------------------------------------------------

/// A git repository on disk, addressed by its root directory.
#[derive(Clone, Debug)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    /// Open `root` as a git repository.
    ///
    /// # Errors
    /// Fails when `root` is not a directory or carries no `.git` metadata
    /// directory — checked up front so a bad path never reaches the first
    /// chunk.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            bail!(
                "repository directory not found: {}\n  \
                 To fix: check the path, or clone the repository first.",
                root.display()
            );
        }
        if !root.join(".git").is_dir() {
            bail!(
                "not a git repository (no .git directory): {}\n  \
                 To fix: point at the repository root, or run `git init` there.",
                root.display()
            );
        }
        Ok(Self { root })
    }

    /// The repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run one git command in the repo root, folding spawn errors and
    /// non-zero exits into [`CmdOutcome::Failed`].
    fn run_git(&self, args: &[&str]) -> CmdOutcome {
        let output = match Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                return CmdOutcome::Failed {
                    detail: format!("failed to run git {}: {e}", args.join(" ")),
                };
            }
        };

        if output.status.success() {
            debug!(command = %args.join(" "), "git ok");
            return CmdOutcome::Success;
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = format!("{stderr}{stdout}").trim().to_owned();
        debug!(command = %args.join(" "), %detail, "git failed");
        CmdOutcome::Failed { detail }
    }
}

impl Vcs for GitRepo {
    fn stage(&mut self, path: &str) -> StageOutcome {
        if !self.root.join(path).exists() {
            return StageOutcome::Missing;
        }
        match self.run_git(&["add", "--", path]) {
            CmdOutcome::Success => StageOutcome::Staged,
            CmdOutcome::Failed { detail } => StageOutcome::Failed { detail },
        }
    }

    fn commit(&mut self, message: &str) -> CmdOutcome {
        self.run_git(&["commit", "-m", message])
    }

    fn push(&mut self) -> CmdOutcome {
        self.run_git(&["push"])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
