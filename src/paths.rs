//! Filesystem layout under `<repo>/.bagakit/ft-harness/` (spec §6).

use std::path::{Path, PathBuf};

/// Resolved set of paths for one harness-governed repository.
#[derive(Debug, Clone)]
pub struct HarnessPaths {
    pub repo_root: PathBuf,
}

impl HarnessPaths {
    pub fn at(repo_root: impl Into<PathBuf>) -> Self {
        HarnessPaths {
            repo_root: repo_root.into(),
        }
    }

    pub fn harness_root(&self) -> PathBuf {
        self.repo_root.join(".bagakit").join("ft-harness")
    }

    pub fn config_path(&self) -> PathBuf {
        self.harness_root().join("config.json")
    }

    pub fn index_path(&self) -> PathBuf {
        self.harness_root().join("index").join("feats.json")
    }

    pub fn feats_dir(&self) -> PathBuf {
        self.harness_root().join("feats")
    }

    pub fn archived_dir(&self) -> PathBuf {
        self.harness_root().join("feats-archived")
    }

    pub fn feat_dir(&self, feat_id: &str) -> PathBuf {
        self.feats_dir().join(feat_id)
    }

    pub fn archived_feat_dir(&self, feat_id: &str) -> PathBuf {
        self.archived_dir().join(feat_id)
    }

    pub fn state_path(&self, feat_id: &str) -> PathBuf {
        self.feat_dir(feat_id).join("state.json")
    }

    pub fn tasks_path(&self, feat_id: &str) -> PathBuf {
        self.feat_dir(feat_id).join("tasks.json")
    }

    pub fn commit_message_path(&self, feat_id: &str, task_id: &str) -> PathBuf {
        self.feat_dir(feat_id)
            .join("commits")
            .join(format!("{task_id}.msg"))
    }

    pub fn gate_evidence_dir(&self, feat_id: &str, task_id: &str) -> PathBuf {
        self.feat_dir(feat_id).join("gate").join(task_id)
    }

    /// `<repo>/.worktrees/<feat-id>/` — owned exclusively by the worktree
    /// manager (C3), never written to directly by other components.
    pub fn worktree_dir(&self, worktrees_root: &str, feat_id: &str) -> PathBuf {
        self.repo_root.join(worktrees_root).join(feat_id)
    }
}

/// Absolute, canonicalized worktree path as a string — used in persisted
/// state so `worktree_path` is always comparable across processes.
pub fn canonical_string(path: &Path) -> String {
    dunce::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}
