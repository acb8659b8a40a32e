//! `validate-harness` (fast, local, schema-only) and `diagnose-harness`
//! (the full cross-reference audit, C8, spec §4.8).

use crate::commands::{require_initialized, Context};
use crate::error::FtError;
use crate::output::Report;
use crate::ssot;
use crate::ssot::schema::{FeatState, FeatsIndex, TaskList};
use crate::ssot::Document;

/// Structural validation only: every persisted document still satisfies
/// its own `Document::validate()` (spec §3 invariants). No VCS calls, no
/// filesystem-vs-registry comparison — that's [`diagnose_harness`].
pub fn validate_harness(ctx: &Context) -> Result<Report, FtError> {
    require_initialized(&ctx.paths)?;
    let config = ctx.load_config()?;
    config.validate()?;
    let index: FeatsIndex = ssot::load(&ctx.paths.index_path())?;
    index.validate()?;

    let mut problems = Vec::new();
    for feat_id in index.feats.keys() {
        match ssot::load::<FeatState>(&ctx.paths.state_path(feat_id)) {
            Ok(feat) => {
                if let Err(e) = feat.validate() {
                    problems.push(format!("{feat_id}: {e}"));
                }
            }
            Err(e) => problems.push(format!("{feat_id}: {e}")),
        }
        match ssot::load::<TaskList>(&ctx.paths.tasks_path(feat_id)) {
            Ok(tasks) => {
                if let Err(e) = tasks.validate() {
                    problems.push(format!("{feat_id}: {e}"));
                }
            }
            Err(e) => problems.push(format!("{feat_id}: {e}")),
        }
    }

    if !problems.is_empty() {
        return Err(FtError::Corrupt {
            path: ctx.paths.harness_root(),
            reason: problems.join("; "),
        });
    }
    Ok(Report::new()
        .field("status", "valid")
        .field("feats_checked", index.feats.len() as i64))
}

/// Full cross-reference audit (spec §4.8). Always returns `Ok` — drift is
/// data, not a failure of the audit itself; the CLI layer maps a non-empty
/// report to exit code 3.
pub fn diagnose_harness(ctx: &Context) -> Result<crate::doctor::DriftReport, FtError> {
    require_initialized(&ctx.paths)?;
    let config = ctx.load_config()?;
    crate::doctor::run(&ctx.vcs, &ctx.paths, &config.doctor)
}
