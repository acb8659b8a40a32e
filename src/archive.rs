//! The archive finalizer (C7, spec §4.7).
//!
//! Implemented as a plain sequential function with explicit compensating
//! actions on the steps that can fail destructively, rather than a
//! generic list of reversible steps — the sequence is fixed and short, so
//! a step-list abstraction would only hide what actually happens.

use std::path::PathBuf;

use crate::collaborators::LivingDocsSink;
use crate::error::FtError;
use crate::paths::HarnessPaths;
use crate::ssot;
use crate::ssot::schema::{ArchivePolicy, FeatState, FeatStatus, FeatsIndex, TaskList};
use crate::util::now_rfc3339;
use crate::vcs::Vcs;
use crate::worktree;

pub struct ArchiveOutcome {
    pub feat: FeatState,
    pub archived_dir: PathBuf,
    pub branch_deleted: bool,
}

pub fn archive_feat(
    vcs: &dyn Vcs,
    paths: &HarnessPaths,
    policy: &ArchivePolicy,
    living_docs: &dyn LivingDocsSink,
    feat_id: &str,
) -> Result<ArchiveOutcome, FtError> {
    let feat_dir = paths.feat_dir(feat_id);
    let archived_dir = paths.archived_feat_dir(feat_id);
    let state_path = paths.state_path(feat_id);
    let archived_state_path = paths.archived_feat_dir(feat_id).join("state.json");
    let tasks_path = paths.tasks_path(feat_id);

    let feat: FeatState = ssot::load(&state_path)?;
    let tasks: TaskList = ssot::load(&tasks_path)?;

    // 1. Precondition check.
    if !matches!(feat.status, FeatStatus::Done | FeatStatus::Abandoned) {
        return Err(FtError::InvalidTransition {
            reason: format!(
                "feat {} must be done or abandoned to archive (is {})",
                feat.id, feat.status
            ),
        });
    }
    let worktree_path = feat
        .worktree_path
        .as_ref()
        .map(PathBuf::from)
        .ok_or_else(|| FtError::InvalidTransition {
            reason: format!("feat {} has no worktree_path recorded", feat.id),
        })?;
    if policy.require_clean && !vcs.worktree_is_clean(&worktree_path)? {
        return Err(FtError::InvalidTransition {
            reason: format!("worktree for feat {} is not clean", feat.id),
        });
    }
    if feat.status == FeatStatus::Done && policy.require_merged {
        let branch = feat
            .branch
            .as_ref()
            .ok_or_else(|| FtError::InvalidTransition {
                reason: format!("feat {} has no branch recorded", feat.id),
            })?;
        if !vcs.is_merged(branch, &feat.base_branch)? {
            return Err(FtError::InvalidTransition {
                reason: format!(
                    "feat {} branch is not merged into {}",
                    feat.id, feat.base_branch
                ),
            });
        }
    }

    // 2. Relocate state (rename is atomic within a filesystem).
    if let Some(parent) = archived_dir.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FtError::Io {
            context: format!("creating {}", parent.display()),
            source: e.to_string(),
        })?;
    }
    std::fs::rename(&feat_dir, &archived_dir).map_err(|e| FtError::Io {
        context: format!(
            "relocating {} to {}",
            feat_dir.display(),
            archived_dir.display()
        ),
        source: e.to_string(),
    })?;

    // 3. Remove worktree; roll back the relocation on failure.
    if let Err(err) = worktree::remove(vcs, &worktree_path, false) {
        if let Err(rollback_err) = std::fs::rename(&archived_dir, &feat_dir) {
            return Err(FtError::Io {
                context: format!(
                    "rolling back archive of {} after worktree removal failed ({err}); manual recovery required",
                    feat.id
                ),
                source: rollback_err.to_string(),
            });
        }
        return Err(err);
    }

    // 4. Delete branch — best-effort.
    let mut branch_deleted = false;
    if let Some(branch) = &feat.branch {
        match vcs.delete_branch(branch, false) {
            Ok(()) => branch_deleted = true,
            Err(err) => log::warn!("archive of {}: branch deletion failed: {err}", feat.id),
        }
    }

    // 5. Update index.
    let index_path = paths.index_path();
    ssot::mutate(&index_path, |mut index: FeatsIndex| {
        index.feats.shift_remove(feat_id);
        Ok(index)
    })?;

    // 6. Optional memory sync — best-effort, never fails the archive.
    if let Err(err) = living_docs.sync(feat_id, &archived_dir) {
        log::warn!("archive of {}: living-docs sync failed: {err}", feat.id);
    }

    // 7. Set status at the new location.
    let archived_feat = ssot::mutate_existing(&archived_state_path, |mut state: FeatState| {
        state.status = FeatStatus::Archived;
        state.archived_at = Some(now_rfc3339());
        state.branch = None;
        state.worktree_path = None;
        state.updated_at = now_rfc3339();
        Ok(state)
    })?;

    check_postconditions(vcs, &feat_dir, &archived_dir, &worktree_path, &index_path, feat_id)?;

    Ok(ArchiveOutcome {
        feat: archived_feat,
        archived_dir,
        branch_deleted,
    })
}

fn check_postconditions(
    vcs: &dyn Vcs,
    feat_dir: &std::path::Path,
    archived_dir: &std::path::Path,
    worktree_path: &std::path::Path,
    index_path: &std::path::Path,
    feat_id: &str,
) -> Result<(), FtError> {
    if feat_dir.exists() {
        return Err(FtError::Io {
            context: "archive post-condition".to_string(),
            source: format!("{} still exists", feat_dir.display()),
        });
    }
    if !archived_dir.exists() {
        return Err(FtError::Io {
            context: "archive post-condition".to_string(),
            source: format!("{} was not created", archived_dir.display()),
        });
    }
    if worktree_path.exists() {
        return Err(FtError::StaleWorktreeRegistration {
            path: worktree_path.to_path_buf(),
        });
    }
    if worktree::is_registered(vcs, worktree_path)? {
        return Err(FtError::StaleWorktreeRegistration {
            path: worktree_path.to_path_buf(),
        });
    }
    let index: FeatsIndex = ssot::load(index_path)?;
    if index.feats.contains_key(feat_id) {
        return Err(FtError::Io {
            context: "archive post-condition".to_string(),
            source: format!("index still contains {feat_id}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::NoopLivingDocsSink;
    use crate::ssot::schema::{FeatsIndex, GateResult, IndexEntry, Task, TaskStatus};
    use crate::vcs::FakeVcs;
    use tempfile::tempdir;

    fn seed_feat(paths: &HarnessPaths, vcs: &FakeVcs, feat_id: &str, status: FeatStatus) -> PathBuf {
        let worktree_dir = paths.worktree_dir(".worktrees", feat_id);
        std::fs::create_dir_all(&worktree_dir).unwrap();
        let branch = format!("feat/{feat_id}");
        vcs.add_worktree(&worktree_dir, &branch).unwrap();
        vcs.mark_merged(&branch);

        let feat = FeatState {
            schema_version: 1,
            id: feat_id.to_string(),
            title: "demo".to_string(),
            goal: "demo goal".to_string(),
            slug: "demo".to_string(),
            status,
            branch: Some(branch),
            worktree_path: Some(worktree_dir.to_string_lossy().into_owned()),
            base_branch: "main".to_string(),
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
            archived_at: None,
            extra: Default::default(),
        };
        ssot::create(&paths.state_path(feat_id), &feat).unwrap();

        let mut task = Task::new("T-001".to_string(), "do it".to_string());
        task.status = TaskStatus::Done;
        task.gate_result = GateResult::Pass;
        task.commit_sha = Some("sha".to_string());
        let tasks = TaskList {
            schema_version: 1,
            tasks: vec![task],
            extra: Default::default(),
        };
        ssot::create(&paths.tasks_path(feat_id), &tasks).unwrap();

        let mut index = FeatsIndex::default();
        index.feats.insert(
            feat_id.to_string(),
            IndexEntry {
                title: "demo".to_string(),
                status,
                branch: format!("feat/{feat_id}"),
                worktree_path: worktree_dir.to_string_lossy().into_owned(),
            },
        );
        ssot::create(&paths.index_path(), &index).unwrap();

        worktree_dir
    }

    #[test]
    fn archive_relocates_state_and_clears_index() {
        let repo = tempdir().unwrap();
        let paths = HarnessPaths::at(repo.path());
        let vcs = FakeVcs::new("main");
        let worktree_dir = seed_feat(&paths, &vcs, "F-demo-001", FeatStatus::Done);

        let outcome = archive_feat(
            &vcs,
            &paths,
            &ArchivePolicy::default(),
            &NoopLivingDocsSink,
            "F-demo-001",
        )
        .unwrap();

        assert_eq!(outcome.feat.status, FeatStatus::Archived);
        assert!(!paths.feat_dir("F-demo-001").exists());
        assert!(paths.archived_feat_dir("F-demo-001").exists());
        assert!(!worktree_dir.exists() || !vcs.list_worktrees().unwrap().contains(&worktree_dir));
        let index: FeatsIndex = ssot::load(&paths.index_path()).unwrap();
        assert!(!index.feats.contains_key("F-demo-001"));
    }

    #[test]
    fn archive_rejects_feat_not_done_or_abandoned() {
        let repo = tempdir().unwrap();
        let paths = HarnessPaths::at(repo.path());
        let vcs = FakeVcs::new("main");
        seed_feat(&paths, &vcs, "F-demo-001", FeatStatus::Active);

        let err = archive_feat(
            &vcs,
            &paths,
            &ArchivePolicy::default(),
            &NoopLivingDocsSink,
            "F-demo-001",
        )
        .unwrap_err();
        assert!(matches!(err, FtError::InvalidTransition { .. }));
    }

    #[test]
    fn archive_rejects_unmerged_branch_when_required() {
        let repo = tempdir().unwrap();
        let paths = HarnessPaths::at(repo.path());
        let vcs = FakeVcs::new("main");
        let worktree_dir = paths.worktree_dir(".worktrees", "F-demo-001");
        std::fs::create_dir_all(&worktree_dir).unwrap();
        vcs.add_worktree(&worktree_dir, "feat/F-demo-001").unwrap();
        // deliberately not marked merged

        let feat = FeatState {
            schema_version: 1,
            id: "F-demo-001".to_string(),
            title: "demo".to_string(),
            goal: "demo goal".to_string(),
            slug: "demo".to_string(),
            status: FeatStatus::Done,
            branch: Some("feat/F-demo-001".to_string()),
            worktree_path: Some(worktree_dir.to_string_lossy().into_owned()),
            base_branch: "main".to_string(),
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
            archived_at: None,
            extra: Default::default(),
        };
        ssot::create(&paths.state_path("F-demo-001"), &feat).unwrap();
        let mut task = Task::new("T-001".to_string(), "do it".to_string());
        task.status = TaskStatus::Done;
        task.gate_result = GateResult::Pass;
        task.commit_sha = Some("sha".to_string());
        let tasks = TaskList {
            schema_version: 1,
            tasks: vec![task],
            extra: Default::default(),
        };
        ssot::create(&paths.tasks_path("F-demo-001"), &tasks).unwrap();
        ssot::create(&paths.index_path(), &FeatsIndex::default()).unwrap();

        let err = archive_feat(
            &vcs,
            &paths,
            &ArchivePolicy::default(),
            &NoopLivingDocsSink,
            "F-demo-001",
        )
        .unwrap_err();
        assert!(matches!(err, FtError::InvalidTransition { .. }));
    }
}
