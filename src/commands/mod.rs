//! Command handlers: the thin orchestration layer between the CLI (§6)
//! and the core components. Each function here wires together exactly
//! the components one subcommand needs — nothing here owns state on its
//! own, matching the ownership rules of spec §3's "Ownership" section.

mod audit;
mod feat;
mod readiness;
mod task;

pub use audit::{diagnose_harness, validate_harness};
pub use feat::{
    archive_feat, create_feat, filter_feats, get_feat, initialize_harness, list_feats,
    show_feat_status,
};
pub use readiness::{check_reference_readiness, validate_reference_report};
pub use task::{finish_task, prepare_task_commit, run_task_gate, start_task};

use std::path::{Path, PathBuf};

use crate::collaborators::{DefaultReferenceReadinessGate, NoopLivingDocsSink};
use crate::error::FtError;
use crate::paths::HarnessPaths;
use crate::ssot::schema::HarnessConfig;
use crate::vcs::GitVcs;

/// Bundles the collaborators every command needs so handler signatures
/// stay short. Always constructed fresh per-invocation — this crate has
/// no long-running process that would make caching it worthwhile (spec
/// §5 "short-lived CLI invocations").
pub struct Context {
    pub paths: HarnessPaths,
    pub vcs: GitVcs,
    pub readiness_gate: DefaultReferenceReadinessGate,
    pub living_docs: NoopLivingDocsSink,
}

impl Context {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Context {
            vcs: GitVcs::at(&root),
            paths: HarnessPaths::at(root),
            readiness_gate: DefaultReferenceReadinessGate,
            living_docs: NoopLivingDocsSink,
        }
    }

    pub fn load_config(&self) -> Result<HarnessConfig, FtError> {
        crate::config::load(&self.paths.config_path())
    }
}

/// Shared guard: every command but `initialize-harness` needs the
/// harness to already exist.
pub fn require_initialized(paths: &HarnessPaths) -> Result<(), FtError> {
    if !paths.config_path().exists() {
        return Err(FtError::NotFound {
            what: format!(
                "harness not initialized at {} (run initialize-harness first)",
                paths.harness_root().display()
            ),
        });
    }
    Ok(())
}

pub(crate) fn feat_state_path(paths: &HarnessPaths, feat_id: &str) -> PathBuf {
    paths.state_path(feat_id)
}

pub(crate) fn load_feat(paths: &HarnessPaths, feat_id: &str) -> Result<crate::ssot::schema::FeatState, FtError> {
    crate::ssot::load(&feat_state_path(paths, feat_id))
}

pub(crate) fn load_tasks(paths: &HarnessPaths, feat_id: &str) -> Result<crate::ssot::schema::TaskList, FtError> {
    crate::ssot::load(&paths.tasks_path(feat_id))
}

/// Whether `worktree` has any staged or unstaged diff against HEAD —
/// used by `prepare-task-commit`'s precondition (spec §4.5: "worktree has
/// staged+unstaged diff ≠ ∅"). Untracked files count too, matching
/// `worktree_is_clean`'s own definition of dirty.
pub(crate) fn worktree_has_changes(vcs: &dyn crate::vcs::Vcs, worktree: &Path) -> Result<bool, FtError> {
    Ok(!vcs.worktree_is_clean(worktree)?)
}
