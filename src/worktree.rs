//! The worktree manager (C3, spec §4.3).
//!
//! Owns the feat ↔ directory mapping. Thin on purpose: both real
//! operations it performs (allocate on create, remove on archive) are one
//! call into the VCS adapter plus a path computation — the interesting
//! logic (reconciliation) lives in the doctor, which reads through this
//! module's path helpers rather than duplicating them.

use std::path::{Path, PathBuf};

use crate::error::FtError;
use crate::paths::HarnessPaths;
use crate::vcs::Vcs;

/// Allocate `<repo>/<worktrees_root>/<feat-id>/` and register it with the
/// VCS as a checkout of `branch`. Returns the canonicalized path to store
/// in `FeatState::worktree_path`.
pub fn create(
    vcs: &dyn Vcs,
    paths: &HarnessPaths,
    worktrees_root: &str,
    feat_id: &str,
    branch: &str,
) -> Result<PathBuf, FtError> {
    let dir = paths.worktree_dir(worktrees_root, feat_id);
    if let Some(parent) = dir.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FtError::Io {
            context: format!("creating worktrees root {}", parent.display()),
            source: e.to_string(),
        })?;
    }
    vcs.add_worktree(&dir, branch)?;
    Ok(dir)
}

/// Remove the worktree directory for `feat_id` and deregister it.
pub fn remove(vcs: &dyn Vcs, worktree_path: &Path, force: bool) -> Result<(), FtError> {
    vcs.remove_worktree(worktree_path, force)
}

/// Whether the VCS worktree registry still lists `path` (spec §4.7
/// post-condition (d): "VCS worktree registry does not list the path").
pub fn is_registered(vcs: &dyn Vcs, path: &Path) -> Result<bool, FtError> {
    Ok(vcs.list_worktrees()?.contains(path))
}
