//! The version-control adapter (C2, spec §4.2).
//!
//! `Vcs` is a capability trait so the lifecycle engine and archive
//! finalizer never talk to `git` directly — [`GitVcs`] is the production
//! implementation (grounded on the teacher's `Repository::run_command` /
//! `run_command_check` in the flat `src/git.rs`), and [`FakeVcs`] is an
//! in-memory stand-in used by the lifecycle/archive unit tests so the
//! property tests of spec §8 run without a real `git` binary.

mod fake;
mod git;

pub use fake::FakeVcs;
pub use git::GitVcs;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::FtError;

pub trait Vcs {
    /// The branch considered the integration base for new feats.
    fn current_base_branch(&self) -> Result<String, FtError>;

    /// Create `feat/<feat_id>` off `from`. Fails if it already exists.
    fn create_feat_branch(&self, feat_id: &str, from: &str) -> Result<String, FtError>;

    /// Register a worktree checkout of `branch` at `path`. Fails if `path`
    /// exists and is non-empty.
    fn add_worktree(&self, path: &Path, branch: &str) -> Result<(), FtError>;

    /// Deregister and remove the worktree at `path`. Fails if the working
    /// copy is dirty unless `force`.
    fn remove_worktree(&self, path: &Path, force: bool) -> Result<(), FtError>;

    /// Absolute paths of every registered worktree (porcelain listing).
    fn list_worktrees(&self) -> Result<BTreeSet<PathBuf>, FtError>;

    /// Whether `branch` is fully merged into `into`.
    fn is_merged(&self, branch: &str, into: &str) -> Result<bool, FtError>;

    /// Delete `branch`. Fails if unmerged unless `force`.
    fn delete_branch(&self, branch: &str, force: bool) -> Result<(), FtError>;

    /// Whether the worktree at `path` has no staged, unstaged, or
    /// untracked changes.
    fn worktree_is_clean(&self, path: &Path) -> Result<bool, FtError>;

    /// The full message (subject + body + trailers) of HEAD in the
    /// worktree at `path`. Used by the commit protocol (spec §4.6) to
    /// re-parse and validate the operator's commit.
    fn head_message(&self, path: &Path) -> Result<String, FtError>;

    /// The commit SHA of HEAD in the worktree at `path`.
    fn head_sha(&self, path: &Path) -> Result<String, FtError>;

    /// The branch currently checked out in the worktree at `path` (spec
    /// §4.3(c)/§4.8: doctor reconciliation checks this equals
    /// `feat/<feat-id>`).
    fn worktree_head_branch(&self, path: &Path) -> Result<String, FtError>;

    /// Stage everything and commit using `message_file` as the message,
    /// returning the new HEAD sha. Used only when `prepare-task-commit
    /// --execute` asks the harness to commit on the operator's behalf
    /// instead of leaving it as a manual step (spec §4.6).
    fn commit_with_message_file(&self, worktree: &Path, message_file: &Path) -> Result<String, FtError>;
}
