//! The lifecycle engine (C5, spec §4.5) — the state machine.
//!
//! Transition functions are pure: they take a value and an event and
//! return the next value or an [`FtError::InvalidTransition`]. Callers
//! (the command handlers) sequence I/O — SSOT mutate, VCS calls, gate
//! runs — around these pure calls, per the teacher's own separation of
//! "decide" from "do" (cf. `config/hooks.rs` computing a plan before
//! anything touches disk).

use crate::error::FtError;
use crate::ssot::schema::{FeatState, FeatStatus, GateResult, Task, TaskList, TaskStatus};
use crate::util::now_rfc3339;

/// Events that can be applied to a single [`Task`].
pub enum TaskEvent {
    Start,
    RecordGate { result: GateResult },
    FinishDone { commit_sha: String },
    FinishBlocked,
    Reopen,
}

/// Apply `event` to `task`, enforcing spec §4.5's per-task preconditions.
/// `other_in_progress` is whether some *other* task in the same feat is
/// currently `in_progress` (only relevant to `Start`).
pub fn apply_task_event(
    task: &Task,
    event: TaskEvent,
    other_in_progress: bool,
) -> Result<Task, FtError> {
    let mut next = task.clone();
    match event {
        TaskEvent::Start => {
            if !matches!(task.status, TaskStatus::Planned | TaskStatus::Blocked) {
                return Err(FtError::InvalidTransition {
                    reason: format!(
                        "task {} cannot be started from status {}",
                        task.id, task.status
                    ),
                });
            }
            if other_in_progress {
                return Err(FtError::InvalidTransition {
                    reason: format!(
                        "another task is already in_progress; cannot start {}",
                        task.id
                    ),
                });
            }
            next.status = TaskStatus::InProgress;
            next.started_at = Some(now_rfc3339());
            next.finished_at = None;
        }
        TaskEvent::RecordGate { result } => {
            if task.status != TaskStatus::InProgress {
                return Err(FtError::InvalidTransition {
                    reason: format!(
                        "task {} must be in_progress to run the gate (is {})",
                        task.id, task.status
                    ),
                });
            }
            next.gate_result = result;
        }
        TaskEvent::FinishDone { commit_sha } => {
            if task.status != TaskStatus::InProgress {
                return Err(FtError::InvalidTransition {
                    reason: format!(
                        "task {} must be in_progress to finish (is {})",
                        task.id, task.status
                    ),
                });
            }
            if task.gate_result != GateResult::Pass {
                return Err(FtError::InvalidTransition {
                    reason: format!(
                        "task {} cannot finish done without gate_result=pass",
                        task.id
                    ),
                });
            }
            if commit_sha.is_empty() {
                return Err(FtError::InvalidTransition {
                    reason: format!("task {} finish done requires a commit_sha", task.id),
                });
            }
            next.status = TaskStatus::Done;
            next.commit_sha = Some(commit_sha);
            next.finished_at = Some(now_rfc3339());
        }
        TaskEvent::FinishBlocked => {
            if task.status != TaskStatus::InProgress {
                return Err(FtError::InvalidTransition {
                    reason: format!(
                        "task {} must be in_progress to block (is {})",
                        task.id, task.status
                    ),
                });
            }
            next.status = TaskStatus::Blocked;
            next.finished_at = Some(now_rfc3339());
        }
        TaskEvent::Reopen => {
            if task.status != TaskStatus::Blocked {
                return Err(FtError::InvalidTransition {
                    reason: format!("task {} must be blocked to reopen", task.id),
                });
            }
            if other_in_progress {
                return Err(FtError::InvalidTransition {
                    reason: format!(
                        "another task is already in_progress; cannot reopen {}",
                        task.id
                    ),
                });
            }
            next.status = TaskStatus::InProgress;
            next.started_at = Some(now_rfc3339());
            next.finished_at = None;
        }
    }
    Ok(next)
}

/// Whether `other_in_progress` should be true for `task_id` given a task
/// list — true iff some *other* task is `in_progress`.
pub fn has_other_in_progress(tasks: &TaskList, task_id: &str) -> bool {
    tasks
        .tasks
        .iter()
        .any(|t| t.id != task_id && t.status == TaskStatus::InProgress)
}

/// A feat's status is a pure function of its tasks' statuses and archive
/// metadata (spec §3, §4.5). Never called on an already-archived feat —
/// archival is a one-way transition owned by C7.
pub fn derive_feat_status(current: FeatStatus, tasks: &TaskList) -> FeatStatus {
    if current == FeatStatus::Abandoned || current == FeatStatus::Archived {
        return current;
    }
    if tasks.tasks.is_empty() {
        return current;
    }
    if tasks.tasks.iter().all(|t| t.status == TaskStatus::Done) {
        return FeatStatus::Done;
    }
    if tasks
        .tasks
        .iter()
        .any(|t| !matches!(t.status, TaskStatus::Planned))
    {
        return FeatStatus::Active;
    }
    current
}

/// Mark a feat `abandoned`. Fails if any task is `in_progress` (spec §4.5).
pub fn abandon_feat(feat: &FeatState, tasks: &TaskList) -> Result<FeatState, FtError> {
    if feat.status == FeatStatus::Archived {
        return Err(FtError::InvalidTransition {
            reason: format!("feat {} is already archived", feat.id),
        });
    }
    if tasks.in_progress().is_some() {
        return Err(FtError::InvalidTransition {
            reason: format!(
                "feat {} has a task in_progress; cannot abandon",
                feat.id
            ),
        });
    }
    let mut next = feat.clone();
    next.status = FeatStatus::Abandoned;
    next.updated_at = now_rfc3339();
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn planned(id: &str) -> Task {
        Task::new(id.to_string(), "do a thing".to_string())
    }

    #[test]
    fn start_task_requires_planned_or_blocked() {
        let mut t = planned("T-001");
        t.status = TaskStatus::Done;
        let err = apply_task_event(&t, TaskEvent::Start, false).unwrap_err();
        assert!(matches!(err, FtError::InvalidTransition { .. }));
    }

    #[test]
    fn start_task_rejects_second_concurrent_in_progress() {
        let t = planned("T-002");
        let err = apply_task_event(&t, TaskEvent::Start, true).unwrap_err();
        assert!(matches!(err, FtError::InvalidTransition { .. }));
    }

    #[test]
    fn finish_done_requires_gate_pass_and_commit_sha() {
        let mut t = planned("T-001");
        t.status = TaskStatus::InProgress;
        let err = apply_task_event(
            &t,
            TaskEvent::FinishDone {
                commit_sha: "deadbeef".to_string(),
            },
            false,
        )
        .unwrap_err();
        assert!(matches!(err, FtError::InvalidTransition { .. }));

        t.gate_result = GateResult::Pass;
        let next = apply_task_event(
            &t,
            TaskEvent::FinishDone {
                commit_sha: "deadbeef".to_string(),
            },
            false,
        )
        .unwrap();
        assert_eq!(next.status, TaskStatus::Done);
        assert_eq!(next.commit_sha.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn blocked_task_can_be_reopened() {
        let mut t = planned("T-001");
        t.status = TaskStatus::Blocked;
        let next = apply_task_event(&t, TaskEvent::Reopen, false).unwrap();
        assert_eq!(next.status, TaskStatus::InProgress);
        assert!(next.finished_at.is_none());
    }

    #[test]
    fn feat_status_is_done_once_all_tasks_done() {
        let mut tasks = TaskList::default();
        let mut t = planned("T-001");
        t.status = TaskStatus::Done;
        t.gate_result = GateResult::Pass;
        t.commit_sha = Some("sha".into());
        tasks.tasks.push(t);
        assert_eq!(
            derive_feat_status(FeatStatus::Active, &tasks),
            FeatStatus::Done
        );
    }

    #[test]
    fn feat_status_stays_draft_while_all_tasks_planned() {
        let mut tasks = TaskList::default();
        tasks.tasks.push(planned("T-001"));
        assert_eq!(
            derive_feat_status(FeatStatus::Draft, &tasks),
            FeatStatus::Draft
        );
    }

    #[test]
    fn abandon_fails_with_task_in_progress() {
        let feat = sample_feat();
        let mut tasks = TaskList::default();
        let mut t = planned("T-001");
        t.status = TaskStatus::InProgress;
        tasks.tasks.push(t);
        assert!(abandon_feat(&feat, &tasks).is_err());
    }

    #[rstest]
    #[case(TaskStatus::Planned, true)]
    #[case(TaskStatus::Blocked, true)]
    #[case(TaskStatus::InProgress, false)]
    #[case(TaskStatus::Done, false)]
    fn start_is_only_valid_from_planned_or_blocked(
        #[case] from: TaskStatus,
        #[case] should_succeed: bool,
    ) {
        let mut t = planned("T-001");
        t.status = from;
        let result = apply_task_event(&t, TaskEvent::Start, false);
        assert_eq!(result.is_ok(), should_succeed);
    }

    #[rstest]
    #[case(GateResult::Pass, "sha", true)]
    #[case(GateResult::Fail, "sha", false)]
    #[case(GateResult::Unknown, "sha", false)]
    #[case(GateResult::Pass, "", false)]
    fn finish_done_boundary_cases(
        #[case] gate_result: GateResult,
        #[case] commit_sha: &str,
        #[case] should_succeed: bool,
    ) {
        let mut t = planned("T-001");
        t.status = TaskStatus::InProgress;
        t.gate_result = gate_result;
        let result = apply_task_event(
            &t,
            TaskEvent::FinishDone {
                commit_sha: commit_sha.to_string(),
            },
            false,
        );
        assert_eq!(result.is_ok(), should_succeed);
    }

    fn sample_feat() -> FeatState {
        FeatState {
            schema_version: 1,
            id: "F-demo-001".into(),
            title: "demo".into(),
            goal: "demo goal".into(),
            slug: "demo".into(),
            status: FeatStatus::Active,
            branch: Some("feat/F-demo-001".into()),
            worktree_path: Some("/tmp/demo".into()),
            base_branch: "main".into(),
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
            archived_at: None,
            extra: Default::default(),
        }
    }
}
