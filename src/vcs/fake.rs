//! In-memory [`Vcs`] for lifecycle/archive unit tests.
//!
//! Not part of the spec's enumerated modules — supplemented so the
//! property tests of §8 (e.g. "finish-task done implies a matching HEAD
//! commit") run deterministically without invoking a real `git` binary.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::error::FtError;

use super::Vcs;

#[derive(Debug, Clone, Default)]
struct Branch {
    head_message: String,
    head_sha: String,
}

#[derive(Debug, Default)]
pub struct FakeVcs {
    base_branch: RefCell<String>,
    branches: RefCell<HashMap<String, Branch>>,
    worktrees: RefCell<HashMap<PathBuf, String>>,
    dirty: RefCell<BTreeSet<PathBuf>>,
    merged: RefCell<BTreeSet<String>>,
}

impl FakeVcs {
    pub fn new(base_branch: impl Into<String>) -> Self {
        let fake = FakeVcs {
            base_branch: RefCell::new(base_branch.into()),
            ..Default::default()
        };
        fake.branches
            .borrow_mut()
            .insert(fake.base_branch.borrow().clone(), Branch::default());
        fake
    }

    /// Simulate the operator committing in a feat's worktree.
    pub fn commit(&self, worktree: &Path, message: &str, sha: &str) -> Result<(), FtError> {
        let branch = self
            .worktrees
            .borrow()
            .get(worktree)
            .cloned()
            .ok_or_else(|| FtError::NotFound {
                what: format!("no worktree registered at {}", worktree.display()),
            })?;
        self.branches.borrow_mut().insert(
            branch,
            Branch {
                head_message: message.to_string(),
                head_sha: sha.to_string(),
            },
        );
        self.dirty.borrow_mut().remove(worktree);
        Ok(())
    }

    pub fn mark_dirty(&self, worktree: &Path) {
        self.dirty.borrow_mut().insert(worktree.to_path_buf());
    }

    pub fn mark_merged(&self, branch: &str) {
        self.merged.borrow_mut().insert(branch.to_string());
    }
}

impl Vcs for FakeVcs {
    fn current_base_branch(&self) -> Result<String, FtError> {
        Ok(self.base_branch.borrow().clone())
    }

    fn create_feat_branch(&self, feat_id: &str, _from: &str) -> Result<String, FtError> {
        let branch = format!("feat/{feat_id}");
        let mut branches = self.branches.borrow_mut();
        if branches.contains_key(&branch) {
            return Err(FtError::InvalidTransition {
                reason: format!("branch {branch} already exists"),
            });
        }
        branches.insert(branch.clone(), Branch::default());
        Ok(branch)
    }

    fn add_worktree(&self, path: &Path, branch: &str) -> Result<(), FtError> {
        let mut worktrees = self.worktrees.borrow_mut();
        if worktrees.contains_key(path) {
            return Err(FtError::InvalidTransition {
                reason: format!("worktree path {} exists and is non-empty", path.display()),
            });
        }
        worktrees.insert(path.to_path_buf(), branch.to_string());
        Ok(())
    }

    fn remove_worktree(&self, path: &Path, force: bool) -> Result<(), FtError> {
        if !force && self.dirty.borrow().contains(path) {
            return Err(FtError::InvalidTransition {
                reason: format!("worktree {} has uncommitted changes", path.display()),
            });
        }
        self.worktrees.borrow_mut().remove(path);
        self.dirty.borrow_mut().remove(path);
        Ok(())
    }

    fn list_worktrees(&self) -> Result<BTreeSet<PathBuf>, FtError> {
        Ok(self.worktrees.borrow().keys().cloned().collect())
    }

    fn is_merged(&self, branch: &str, _into: &str) -> Result<bool, FtError> {
        Ok(self.merged.borrow().contains(branch))
    }

    fn delete_branch(&self, branch: &str, force: bool) -> Result<(), FtError> {
        if !force && !self.merged.borrow().contains(branch) {
            return Err(FtError::VcsFailure {
                command: format!("git branch -d {branch}"),
                stderr: "branch not fully merged".to_string(),
                exit_code: Some(1),
            });
        }
        self.branches.borrow_mut().remove(branch);
        Ok(())
    }

    fn worktree_is_clean(&self, path: &Path) -> Result<bool, FtError> {
        Ok(!self.dirty.borrow().contains(path))
    }

    fn head_message(&self, path: &Path) -> Result<String, FtError> {
        let branch = self
            .worktrees
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| FtError::NotFound {
                what: format!("no worktree registered at {}", path.display()),
            })?;
        Ok(self
            .branches
            .borrow()
            .get(&branch)
            .map(|b| b.head_message.clone())
            .unwrap_or_default())
    }

    fn head_sha(&self, path: &Path) -> Result<String, FtError> {
        let branch = self
            .worktrees
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| FtError::NotFound {
                what: format!("no worktree registered at {}", path.display()),
            })?;
        Ok(self
            .branches
            .borrow()
            .get(&branch)
            .map(|b| b.head_sha.clone())
            .unwrap_or_default())
    }

    fn worktree_head_branch(&self, path: &Path) -> Result<String, FtError> {
        self.worktrees
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| FtError::NotFound {
                what: format!("no worktree registered at {}", path.display()),
            })
    }

    fn commit_with_message_file(&self, worktree: &Path, message_file: &Path) -> Result<String, FtError> {
        let message = std::fs::read_to_string(message_file).map_err(|e| FtError::Io {
            context: format!("reading {}", message_file.display()),
            source: e.to_string(),
        })?;
        let sha = format!("{:08x}", self.branches.borrow().len() as u32 * 0x1000 + message.len() as u32);
        self.commit(worktree, &message, &sha)?;
        Ok(sha)
    }
}
