//! `start-task`, `run-task-gate`, `prepare-task-commit`, `finish-task`
//! (spec §4.5, §4.6) — the per-task transitions. Each function sequences
//! a pure [`crate::lifecycle`] decision around the I/O spec §9 says must
//! bracket it: acquire the SSOT lock, decide, write, release, *then*
//! invoke externals (VCS/gate), re-acquiring only to record results.

use std::path::{Path, PathBuf};

use crate::commands::{require_initialized, worktree_has_changes, Context};
use crate::commit::CommitMessage;
use crate::error::FtError;
use crate::gate;
use crate::lifecycle::{apply_task_event, derive_feat_status, has_other_in_progress, TaskEvent};
use crate::output::Report;
use crate::ssot;
use crate::ssot::schema::{GateResult, Task, TaskList, TaskStatus};
use crate::util::now_rfc3339;
use crate::vcs::Vcs;

fn sync_feat_status(ctx: &Context, feat_id: &str, tasks: &TaskList) -> Result<(), FtError> {
    ssot::mutate_existing(&ctx.paths.state_path(feat_id), move |mut feat: crate::ssot::schema::FeatState| {
        let next = derive_feat_status(feat.status, tasks);
        if next != feat.status {
            feat.status = next;
            feat.updated_at = now_rfc3339();
        }
        Ok(feat)
    })?;
    Ok(())
}

pub fn start_task(
    ctx: &Context,
    feat_id: &str,
    task_id: Option<&str>,
    title: Option<&str>,
) -> Result<Report, FtError> {
    require_initialized(&ctx.paths)?;
    let requested = task_id.map(str::to_string);
    let title = title.unwrap_or("untitled task").to_string();

    let tasks = ssot::mutate(&ctx.paths.tasks_path(feat_id), move |mut tasks: TaskList| {
        match &requested {
            Some(id) => {
                let other_in_progress = has_other_in_progress(&tasks, id);
                let current = tasks
                    .get(id)
                    .cloned()
                    .ok_or_else(|| FtError::NotFound {
                        what: format!("task {id} in feat {feat_id}"),
                    })?;
                let next = apply_task_event(&current, TaskEvent::Start, other_in_progress)?;
                *tasks.get_mut(id).expect("just found") = next;
            }
            None => {
                let other_in_progress = tasks.in_progress().is_some();
                let new_id = tasks.next_task_id();
                let fresh = Task::new(new_id, title.clone());
                let started = apply_task_event(&fresh, TaskEvent::Start, other_in_progress)?;
                tasks.tasks.push(started);
            }
        }
        Ok(tasks)
    })?;

    sync_feat_status(ctx, feat_id, &tasks)?;

    let started = tasks
        .in_progress()
        .expect("start-task always leaves exactly one task in_progress");
    Ok(Report::new()
        .field("feat_id", feat_id)
        .field("task_id", started.id.clone())
        .field("status", started.status.to_string()))
}

pub fn run_task_gate(ctx: &Context, feat_id: &str, task_id: &str) -> Result<Report, FtError> {
    require_initialized(&ctx.paths)?;
    let feat = super::load_feat(&ctx.paths, feat_id)?;
    let worktree_path: PathBuf = feat
        .worktree_path
        .map(PathBuf::from)
        .ok_or_else(|| FtError::InvalidTransition {
            reason: format!("feat {feat_id} has no worktree"),
        })?;

    let tasks = super::load_tasks(&ctx.paths, feat_id)?;
    let task = tasks.get(task_id).ok_or_else(|| FtError::NotFound {
        what: format!("task {task_id} in feat {feat_id}"),
    })?;
    if task.status != TaskStatus::InProgress {
        return Err(FtError::InvalidTransition {
            reason: format!("task {task_id} must be in_progress to run the gate (is {})", task.status),
        });
    }

    let config = ctx.load_config()?;
    let evidence_dir = ctx.paths.gate_evidence_dir(feat_id, task_id);
    let outcome = gate::run(&config.gate, &worktree_path, &evidence_dir)?;
    let result = outcome.result;
    let evidence_count = outcome.evidence.len();
    let evidence = outcome.evidence;

    let task_id_owned = task_id.to_string();
    ssot::mutate(&ctx.paths.tasks_path(feat_id), move |mut tasks: TaskList| {
        let task = tasks.get_mut(&task_id_owned).ok_or_else(|| FtError::NotFound {
            what: format!("task {task_id_owned}"),
        })?;
        if task.status != TaskStatus::InProgress {
            return Err(FtError::InvalidTransition {
                reason: format!("task {task_id_owned} is no longer in_progress"),
            });
        }
        task.gate_evidence.extend(evidence);
        task.gate_result = result;
        Ok(tasks)
    })?;

    if result != GateResult::Pass {
        return Err(FtError::GateFailure {
            reason: format!("task {task_id} gate result is {result}"),
        });
    }
    Ok(Report::new()
        .field("feat_id", feat_id)
        .field("task_id", task_id)
        .field("gate_result", result.to_string())
        .field("evidence_count", evidence_count as i64))
}

#[allow(clippy::too_many_arguments)]
pub fn prepare_task_commit(
    ctx: &Context,
    feat_id: &str,
    task_id: &str,
    summary: &str,
    plan: &str,
    check: &str,
    learn: &str,
    execute: bool,
) -> Result<Report, FtError> {
    require_initialized(&ctx.paths)?;
    let feat = super::load_feat(&ctx.paths, feat_id)?;
    let worktree_path: PathBuf = feat
        .worktree_path
        .map(PathBuf::from)
        .ok_or_else(|| FtError::InvalidTransition {
            reason: format!("feat {feat_id} has no worktree"),
        })?;
    let tasks = super::load_tasks(&ctx.paths, feat_id)?;
    let task = tasks.get(task_id).ok_or_else(|| FtError::NotFound {
        what: format!("task {task_id} in feat {feat_id}"),
    })?;
    if task.gate_result != GateResult::Pass {
        return Err(FtError::InvalidTransition {
            reason: format!("task {task_id} gate_result must be pass to prepare a commit"),
        });
    }
    if !worktree_has_changes(&ctx.vcs, &worktree_path)? {
        return Err(FtError::InvalidTransition {
            reason: format!("worktree for feat {feat_id} has no staged or unstaged changes"),
        });
    }

    let message = CommitMessage::generate(
        feat_id,
        task_id,
        summary,
        plan,
        check,
        learn,
        GateResult::Pass,
        TaskStatus::Done,
    )?;

    let message_path = ctx.paths.commit_message_path(feat_id, task_id);
    if let Some(parent) = message_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FtError::Io {
            context: format!("creating {}", parent.display()),
            source: e.to_string(),
        })?;
    }
    std::fs::write(&message_path, message.render()).map_err(|e| FtError::Io {
        context: format!("writing {}", message_path.display()),
        source: e.to_string(),
    })?;

    let mut report = Report::new()
        .field("feat_id", feat_id)
        .field("task_id", task_id)
        .field("message_file", message_path.to_string_lossy().into_owned());

    if execute {
        let sha = ctx.vcs.commit_with_message_file(&worktree_path, &message_path)?;
        report = report.field("commit_sha", sha);
    }
    Ok(report)
}

pub fn finish_task(
    ctx: &Context,
    feat_id: &str,
    task_id: &str,
    done: bool,
) -> Result<Report, FtError> {
    require_initialized(&ctx.paths)?;
    let feat = super::load_feat(&ctx.paths, feat_id)?;

    let commit_sha = if done {
        let worktree_path: PathBuf = feat
            .worktree_path
            .as_deref()
            .map(Path::new)
            .map(Path::to_path_buf)
            .ok_or_else(|| FtError::InvalidTransition {
                reason: format!("feat {feat_id} has no worktree"),
            })?;
        let head_message = ctx.vcs.head_message(&worktree_path)?;
        let parsed = CommitMessage::parse(&head_message)?;
        if parsed.feat_id != feat_id || parsed.task_id != task_id {
            return Err(FtError::TrailerMismatch {
                expected: format!("{feat_id}/{task_id}"),
                found: format!("{}/{}", parsed.feat_id, parsed.task_id),
            });
        }
        Some(ctx.vcs.head_sha(&worktree_path)?)
    } else {
        None
    };

    let task_id_owned = task_id.to_string();
    let tasks = ssot::mutate(&ctx.paths.tasks_path(feat_id), move |mut tasks: TaskList| {
        let current = tasks
            .get(&task_id_owned)
            .cloned()
            .ok_or_else(|| FtError::NotFound {
                what: format!("task {task_id_owned}"),
            })?;
        let event = match &commit_sha {
            Some(sha) => TaskEvent::FinishDone {
                commit_sha: sha.clone(),
            },
            None => TaskEvent::FinishBlocked,
        };
        let next = apply_task_event(&current, event, false)?;
        *tasks.get_mut(&task_id_owned).expect("just found") = next;
        Ok(tasks)
    })?;

    sync_feat_status(ctx, feat_id, &tasks)?;

    let task = tasks.get(task_id).expect("just updated");
    Ok(Report::new()
        .field("feat_id", feat_id)
        .field("task_id", task_id)
        .field("status", task.status.to_string())
        .field("commit_sha", task.commit_sha.clone().unwrap_or_default())
        .field("feat_status", {
            let updated: crate::ssot::schema::FeatState = ssot::load(&ctx.paths.state_path(feat_id))?;
            updated.status.to_string()
        }))
}
