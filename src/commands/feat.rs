//! `initialize-harness`, `create-feat`, `show-feat-status`,
//! `archive-feat`, and the read-only `list-feats`/`get-feat`/
//! `filter-feats` queries (spec §4.2, §4.3, §4.7, §6).

use std::fs;
use std::path::Path;

use crate::collaborators::ReferenceReadinessGate;
use crate::commands::{require_initialized, Context};
use crate::error::FtError;
use crate::output::Report;
use crate::ssot;
use crate::ssot::schema::{
    FeatState, FeatStatus, FeatsIndex, IndexEntry, TaskList,
};
use crate::util::{format_feat_id, now_rfc3339, slugify};
use crate::vcs::Vcs;
use crate::worktree;

pub fn initialize_harness(ctx: &Context, base_branch: Option<&str>) -> Result<Report, FtError> {
    let config = crate::config::initialize(
        &ctx.vcs,
        &ctx.paths.config_path(),
        &ctx.paths.index_path(),
        base_branch,
    )?;
    Ok(Report::new()
        .field("harness_root", ctx.paths.harness_root().to_string_lossy().into_owned())
        .field("base_branch", config.base_branch))
}

/// Directory names directly under `feats/`/`feats-archived/` that look
/// like `F-<slug>-<counter>`, used both for the active-slug collision
/// check and the monotonic counter (spec §3 "Feat ... id
/// (`F-<slug>-<monotonic-counter>`)").
fn feat_ids_under(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| e.file_name().into_string().ok())
        .collect()
}

fn next_counter_for_slug(active_dir: &Path, archived_dir: &Path, slug: &str) -> u32 {
    let prefix = format!("F-{slug}-");
    feat_ids_under(active_dir)
        .into_iter()
        .chain(feat_ids_under(archived_dir))
        .filter_map(|id| id.strip_prefix(&prefix).map(str::to_string))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .map(|n| n + 1)
        .unwrap_or(1)
}

fn active_slug_collision(active_dir: &Path, slug: &str) -> bool {
    let prefix = format!("F-{slug}-");
    feat_ids_under(active_dir)
        .iter()
        .any(|id| id.starts_with(&prefix))
}

pub fn create_feat(
    ctx: &Context,
    title: &str,
    goal: &str,
    slug: Option<&str>,
    manifest: Option<&Path>,
    strict: bool,
) -> Result<Report, FtError> {
    require_initialized(&ctx.paths)?;
    ctx.readiness_gate.check(manifest, strict)?;

    let config = ctx.load_config()?;
    let slug = slug.map(str::to_string).unwrap_or_else(|| slugify(title));
    if slug.is_empty() {
        return Err(FtError::InvalidTransition {
            reason: "slug resolves to an empty string".to_string(),
        });
    }
    let feats_dir = ctx.paths.feats_dir();
    let archived_dir = ctx.paths.archived_dir();
    if active_slug_collision(&feats_dir, &slug) {
        return Err(FtError::InvalidTransition {
            reason: format!("an active feat with slug `{slug}` already exists"),
        });
    }
    let counter = next_counter_for_slug(&feats_dir, &archived_dir, &slug);
    let feat_id = format_feat_id(&slug, counter);

    let branch = ctx.vcs.create_feat_branch(&feat_id, &config.base_branch)?;
    let worktree_path = worktree::create(
        &ctx.vcs,
        &ctx.paths,
        &config.worktrees_root,
        &feat_id,
        &branch,
    )?;
    let worktree_path_str = crate::paths::canonical_string(&worktree_path);

    let now = now_rfc3339();
    let state = FeatState {
        schema_version: crate::ssot::schema::SCHEMA_VERSION,
        id: feat_id.clone(),
        title: title.to_string(),
        goal: goal.to_string(),
        slug: slug.clone(),
        status: FeatStatus::Draft,
        branch: Some(branch.clone()),
        worktree_path: Some(worktree_path_str.clone()),
        base_branch: config.base_branch.clone(),
        created_at: now.clone(),
        updated_at: now,
        archived_at: None,
        extra: Default::default(),
    };
    ssot::create(&ctx.paths.state_path(&feat_id), &state)?;
    ssot::create(&ctx.paths.tasks_path(&feat_id), &TaskList::default())?;

    let feat_dir = ctx.paths.feat_dir(&feat_id);
    fs::create_dir_all(feat_dir.join("spec-deltas")).map_err(|e| FtError::Io {
        context: format!("creating {}", feat_dir.display()),
        source: e.to_string(),
    })?;
    write_if_absent(&feat_dir.join("proposal.md"), &format!("# {title}\n\n{goal}\n"))?;
    write_if_absent(&feat_dir.join("tasks.md"), "# Tasks\n")?;

    ssot::mutate(&ctx.paths.index_path(), |mut index: FeatsIndex| {
        index.feats.insert(
            feat_id.clone(),
            IndexEntry {
                title: title.to_string(),
                status: FeatStatus::Draft,
                branch,
                worktree_path: worktree_path_str,
            },
        );
        Ok(index)
    })?;

    Ok(Report::new()
        .field("feat_id", feat_id)
        .field("worktree", worktree_path.to_string_lossy().into_owned()))
}

fn write_if_absent(path: &Path, contents: &str) -> Result<(), FtError> {
    if path.exists() {
        return Ok(());
    }
    fs::write(path, contents).map_err(|e| FtError::Io {
        context: format!("writing {}", path.display()),
        source: e.to_string(),
    })
}

pub fn show_feat_status(ctx: &Context, feat_id: &str) -> Result<Report, FtError> {
    require_initialized(&ctx.paths)?;
    let feat = super::load_feat(&ctx.paths, feat_id)?;
    let tasks = super::load_tasks(&ctx.paths, feat_id)?;
    let done = tasks.tasks.iter().filter(|t| t.status == crate::ssot::schema::TaskStatus::Done).count();
    Ok(Report::new()
        .field("feat_id", feat.id)
        .field("status", feat.status.to_string())
        .field("branch", feat.branch.unwrap_or_default())
        .field("worktree", feat.worktree_path.unwrap_or_default())
        .field("tasks_total", tasks.tasks.len() as i64)
        .field("tasks_done", done as i64))
}

pub fn archive_feat(ctx: &Context, feat_id: &str) -> Result<Report, FtError> {
    require_initialized(&ctx.paths)?;
    let config = ctx.load_config()?;
    let outcome = crate::archive::archive_feat(
        &ctx.vcs,
        &ctx.paths,
        &config.archive,
        &ctx.living_docs,
        feat_id,
    )?;
    Ok(Report::new()
        .field("feat_id", outcome.feat.id)
        .field("status", outcome.feat.status.to_string())
        .field("archived_dir", outcome.archived_dir.to_string_lossy().into_owned())
        .field("branch_deleted", outcome.branch_deleted))
}

pub fn list_feats(ctx: &Context) -> Result<Vec<(String, IndexEntry)>, FtError> {
    require_initialized(&ctx.paths)?;
    let index: FeatsIndex = ssot::load(&ctx.paths.index_path())?;
    Ok(index.feats.into_iter().collect())
}

pub fn get_feat(ctx: &Context, feat_id: &str) -> Result<Report, FtError> {
    require_initialized(&ctx.paths)?;
    let index: FeatsIndex = ssot::load(&ctx.paths.index_path())?;
    let entry = index.feats.get(feat_id).ok_or_else(|| FtError::NotFound {
        what: format!("feat {feat_id} in index"),
    })?;
    Ok(Report::new()
        .field("feat_id", feat_id)
        .field("title", entry.title.clone())
        .field("status", entry.status.to_string())
        .field("branch", entry.branch.clone())
        .field("worktree", entry.worktree_path.clone()))
}

pub fn filter_feats(ctx: &Context, status: FeatStatus) -> Result<Vec<(String, IndexEntry)>, FtError> {
    require_initialized(&ctx.paths)?;
    let index: FeatsIndex = ssot::load(&ctx.paths.index_path())?;
    Ok(index
        .feats
        .into_iter()
        .filter(|(_, entry)| entry.status == status)
        .collect())
}
