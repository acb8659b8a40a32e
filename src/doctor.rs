//! The doctor/validator (C8, spec §4.8).
//!
//! Read-only cross-reference audit: SSOT vs. filesystem vs. VCS registry.
//! Never mutates state — every field here is computed from `load`/`Vcs`
//! reads, matching the worktree manager's own reconciliation contract
//! (spec §4.3).

use crate::error::FtError;
use crate::paths::HarnessPaths;
use crate::ssot;
use crate::ssot::schema::{DoctorThresholds, FeatState, FeatsIndex, TaskList};
use crate::ssot::Document;
use crate::vcs::Vcs;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum DriftKind {
    MissingStateFile,
    MissingTasksFile,
    MissingIndexEntry,
    MissingWorktreeDir,
    WorktreeNotRegistered,
    WorktreeDirty,
    BranchMismatch,
    InsufficientGateEvidence,
    InvariantViolation,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DriftItem {
    pub feat_id: String,
    pub kind: DriftKind,
    pub detail: String,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DriftReport {
    pub items: Vec<DriftItem>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.items.is_empty()
    }
}

/// Audit every feat listed in the index. Feats whose state file is
/// missing but are still indexed are reported as drift rather than
/// silently skipped.
pub fn run(vcs: &dyn Vcs, paths: &HarnessPaths, thresholds: &DoctorThresholds) -> Result<DriftReport, FtError> {
    let mut report = DriftReport::default();
    let index: FeatsIndex = ssot::load(&paths.index_path())?;
    let registered_worktrees = vcs.list_worktrees()?;

    for feat_id in index.feats.keys() {
        let state_path = paths.state_path(feat_id);
        let feat: FeatState = match ssot::load(&state_path) {
            Ok(feat) => feat,
            Err(_) => {
                report.items.push(DriftItem {
                    feat_id: feat_id.clone(),
                    kind: DriftKind::MissingStateFile,
                    detail: format!("{} is indexed but has no state.json", feat_id),
                });
                continue;
            }
        };

        let tasks_path = paths.tasks_path(feat_id);
        let tasks: Option<TaskList> = ssot::load(&tasks_path).ok();
        if tasks.is_none() {
            report.items.push(DriftItem {
                feat_id: feat_id.clone(),
                kind: DriftKind::MissingTasksFile,
                detail: format!("{} has no tasks.json", feat_id),
            });
        }

        let Some(worktree_path) = feat.worktree_path.as_ref().map(std::path::PathBuf::from) else {
            continue;
        };

        if !worktree_path.exists() {
            report.items.push(DriftItem {
                feat_id: feat_id.clone(),
                kind: DriftKind::MissingWorktreeDir,
                detail: format!("{} does not exist", worktree_path.display()),
            });
        } else if !registered_worktrees.contains(&worktree_path) {
            report.items.push(DriftItem {
                feat_id: feat_id.clone(),
                kind: DriftKind::WorktreeNotRegistered,
                detail: format!(
                    "{} is not in the VCS worktree registry",
                    worktree_path.display()
                ),
            });
        } else {
            match vcs.worktree_is_clean(&worktree_path) {
                Ok(false) => report.items.push(DriftItem {
                    feat_id: feat_id.clone(),
                    kind: DriftKind::WorktreeDirty,
                    detail: format!("{} has uncommitted changes", worktree_path.display()),
                }),
                Ok(true) => {}
                Err(err) => report.items.push(DriftItem {
                    feat_id: feat_id.clone(),
                    kind: DriftKind::WorktreeDirty,
                    detail: err.to_string(),
                }),
            }

            // spec §4.3(c)/§4.8: HEAD of that worktree equals `feat/<feat-id>`.
            let expected_branch = format!("feat/{feat_id}");
            match vcs.worktree_head_branch(&worktree_path) {
                Ok(head_branch) if head_branch == expected_branch => {}
                Ok(head_branch) => report.items.push(DriftItem {
                    feat_id: feat_id.clone(),
                    kind: DriftKind::BranchMismatch,
                    detail: format!(
                        "{} HEAD is {head_branch}, expected {expected_branch}",
                        worktree_path.display()
                    ),
                }),
                Err(err) => report.items.push(DriftItem {
                    feat_id: feat_id.clone(),
                    kind: DriftKind::BranchMismatch,
                    detail: err.to_string(),
                }),
            }
        }

        if let Some(tasks) = &tasks {
            if let Err(err) = tasks.validate() {
                report.items.push(DriftItem {
                    feat_id: feat_id.clone(),
                    kind: DriftKind::InvariantViolation,
                    detail: err.to_string(),
                });
            }
            if thresholds.min_gate_evidence > 0 {
                for task in &tasks.tasks {
                    if task.gate_evidence.len() < thresholds.min_gate_evidence {
                        report.items.push(DriftItem {
                            feat_id: feat_id.clone(),
                            kind: DriftKind::InsufficientGateEvidence,
                            detail: format!(
                                "task {} has {} evidence record(s), below threshold {}",
                                task.id,
                                task.gate_evidence.len(),
                                thresholds.min_gate_evidence
                            ),
                        });
                    }
                }
            }
        }
    }

    // spec §3 invariant: every active feat directory has exactly one index
    // entry. The loop above is index-driven, so a feat directory orphaned
    // by a lost/corrupted index write (the index mutation of create-feat
    // or archive-feat failing after the feat dir was written/renamed) would
    // otherwise go unnoticed.
    if let Ok(entries) = std::fs::read_dir(paths.feats_dir()) {
        for entry in entries.flatten() {
            if !entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let feat_id = entry.file_name().to_string_lossy().into_owned();
            if !index.feats.contains_key(&feat_id) {
                report.items.push(DriftItem {
                    feat_id: feat_id.clone(),
                    kind: DriftKind::MissingIndexEntry,
                    detail: format!("{} exists on disk but has no entry in the index", feat_id),
                });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssot::schema::{FeatStatus, IndexEntry};
    use crate::util::now_rfc3339;
    use crate::vcs::FakeVcs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn reports_missing_worktree_dir() {
        let repo = tempdir().unwrap();
        let paths = HarnessPaths::at(repo.path());
        let vcs = FakeVcs::new("main");

        let feat = FeatState {
            schema_version: 1,
            id: "F-demo-001".into(),
            title: "demo".into(),
            goal: "demo".into(),
            slug: "demo".into(),
            status: FeatStatus::Active,
            branch: Some("feat/F-demo-001".into()),
            worktree_path: Some(repo.path().join(".worktrees/F-demo-001").to_string_lossy().into_owned()),
            base_branch: "main".into(),
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
            archived_at: None,
            extra: Default::default(),
        };
        ssot::create(&paths.state_path("F-demo-001"), &feat).unwrap();
        ssot::create(&paths.tasks_path("F-demo-001"), &TaskList::default()).unwrap();

        let mut index = FeatsIndex::default();
        index.feats.insert(
            "F-demo-001".into(),
            IndexEntry {
                title: "demo".into(),
                status: FeatStatus::Active,
                branch: "feat/F-demo-001".into(),
                worktree_path: "".into(),
            },
        );
        ssot::create(&paths.index_path(), &index).unwrap();

        let report = run(&vcs, &paths, &DoctorThresholds::default()).unwrap();
        assert!(report.items.iter().any(|i| i.kind == DriftKind::MissingWorktreeDir));
    }

    #[test]
    fn clean_repo_reports_no_drift() {
        let repo = tempdir().unwrap();
        let paths = HarnessPaths::at(repo.path());
        let vcs = FakeVcs::new("main");
        ssot::create(&paths.index_path(), &FeatsIndex::default()).unwrap();

        let report = run(&vcs, &paths, &DoctorThresholds::default()).unwrap();
        assert!(report.is_clean());
    }

    fn seed_registered_feat(paths: &HarnessPaths, vcs: &FakeVcs, feat_id: &str, branch: &str) -> PathBuf {
        let worktree_dir = paths.worktree_dir(".worktrees", feat_id);
        std::fs::create_dir_all(&worktree_dir).unwrap();
        vcs.add_worktree(&worktree_dir, branch).unwrap();

        let feat = FeatState {
            schema_version: 1,
            id: feat_id.into(),
            title: "demo".into(),
            goal: "demo".into(),
            slug: "demo".into(),
            status: FeatStatus::Active,
            branch: Some(format!("feat/{feat_id}")),
            worktree_path: Some(worktree_dir.to_string_lossy().into_owned()),
            base_branch: "main".into(),
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
            archived_at: None,
            extra: Default::default(),
        };
        ssot::create(&paths.state_path(feat_id), &feat).unwrap();
        ssot::create(&paths.tasks_path(feat_id), &TaskList::default()).unwrap();
        worktree_dir
    }

    #[test]
    fn reports_branch_mismatch_when_worktree_head_differs_from_feat_branch() {
        let repo = tempdir().unwrap();
        let paths = HarnessPaths::at(repo.path());
        let vcs = FakeVcs::new("main");
        // Registered under a branch other than `feat/<feat-id>`, simulating
        // an operator checking out something else inside the worktree.
        seed_registered_feat(&paths, &vcs, "F-demo-001", "some-other-branch");

        let mut index = FeatsIndex::default();
        index.feats.insert(
            "F-demo-001".into(),
            IndexEntry {
                title: "demo".into(),
                status: FeatStatus::Active,
                branch: "feat/F-demo-001".into(),
                worktree_path: "".into(),
            },
        );
        ssot::create(&paths.index_path(), &index).unwrap();

        let report = run(&vcs, &paths, &DoctorThresholds::default()).unwrap();
        assert!(report.items.iter().any(|i| i.kind == DriftKind::BranchMismatch));
    }

    #[test]
    fn matching_worktree_head_branch_reports_no_mismatch() {
        let repo = tempdir().unwrap();
        let paths = HarnessPaths::at(repo.path());
        let vcs = FakeVcs::new("main");
        seed_registered_feat(&paths, &vcs, "F-demo-001", "feat/F-demo-001");

        let mut index = FeatsIndex::default();
        index.feats.insert(
            "F-demo-001".into(),
            IndexEntry {
                title: "demo".into(),
                status: FeatStatus::Active,
                branch: "feat/F-demo-001".into(),
                worktree_path: "".into(),
            },
        );
        ssot::create(&paths.index_path(), &index).unwrap();

        let report = run(&vcs, &paths, &DoctorThresholds::default()).unwrap();
        assert!(!report.items.iter().any(|i| i.kind == DriftKind::BranchMismatch));
    }

    #[test]
    fn reports_missing_index_entry_for_orphaned_feat_dir() {
        let repo = tempdir().unwrap();
        let paths = HarnessPaths::at(repo.path());
        let vcs = FakeVcs::new("main");

        let feat = FeatState {
            schema_version: 1,
            id: "F-demo-001".into(),
            title: "demo".into(),
            goal: "demo".into(),
            slug: "demo".into(),
            status: FeatStatus::Active,
            branch: Some("feat/F-demo-001".into()),
            worktree_path: None,
            base_branch: "main".into(),
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
            archived_at: None,
            extra: Default::default(),
        };
        ssot::create(&paths.state_path("F-demo-001"), &feat).unwrap();
        ssot::create(&paths.tasks_path("F-demo-001"), &TaskList::default()).unwrap();
        // No index entry for F-demo-001 — orphaned on disk.
        ssot::create(&paths.index_path(), &FeatsIndex::default()).unwrap();

        let report = run(&vcs, &paths, &DoctorThresholds::default()).unwrap();
        assert!(report.items.iter().any(|i| i.kind == DriftKind::MissingIndexEntry));
    }
}
