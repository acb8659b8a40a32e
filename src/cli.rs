//! Argument parsing (spec §6 CLI surface) via `clap`'s derive API —
//! grounded on the teacher's `cli.rs`, trimmed of the pager/completion
//! machinery this crate has no use for.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "ft")]
#[command(about = "Feat/task lifecycle engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Repository root governed by this harness invocation. Required by
    /// every subcommand (spec §6 "Common flags").
    #[arg(long, global = true)]
    pub root: PathBuf,

    /// Emit a single JSON object on stdout instead of `key: value` lines.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishResult {
    Done,
    Blocked,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatStatusArg {
    Draft,
    Active,
    Done,
    Abandoned,
    Archived,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the reference-readiness pre-flight check (external collaborator,
    /// consumed only as a pass/fail precondition to `create-feat`).
    CheckReferenceReadiness {
        #[arg(long)]
        manifest: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        strict: bool,
        #[arg(long, default_value_t = false)]
        no_strict: bool,
    },

    /// Validate a previously-produced reference-readiness report file.
    ValidateReferenceReport {
        #[arg(long)]
        report: PathBuf,
    },

    /// Create `config.json` and an empty `index/feats.json` under
    /// `<root>/.bagakit/ft-harness/`.
    InitializeHarness {
        #[arg(long)]
        base_branch: Option<String>,
    },

    /// Mint a feat id, create its branch and worktree, and write its
    /// initial `state.json`/`tasks.json`.
    CreateFeat {
        #[arg(long)]
        title: String,
        #[arg(long)]
        goal: String,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        manifest: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        strict: bool,
        #[arg(long, default_value_t = false)]
        no_strict: bool,
    },

    /// Print a feat's status and its tasks.
    ShowFeatStatus {
        #[arg(long)]
        feat: String,
    },

    /// Start a task: `planned`/`blocked` -> `in_progress`. Omit `--task`
    /// to mint a new task and start it in one step.
    StartTask {
        #[arg(long)]
        feat: String,
        #[arg(long)]
        task: Option<String>,
        /// Title for a newly-minted task; ignored if `--task` refers to
        /// an existing task.
        #[arg(long)]
        title: Option<String>,
    },

    /// Run the configured quality gate against the task's feat worktree.
    RunTaskGate {
        #[arg(long)]
        feat: String,
        #[arg(long)]
        task: String,
    },

    /// Emit a commit-message file for a gated, in-progress task.
    PrepareTaskCommit {
        #[arg(long)]
        feat: String,
        #[arg(long)]
        task: String,
        #[arg(long)]
        summary: String,
        #[arg(long)]
        plan: String,
        #[arg(long)]
        check: String,
        #[arg(long)]
        learn: String,
        /// Commit on the operator's behalf instead of leaving the message
        /// file for a manual `git commit -F`.
        #[arg(long, default_value_t = false)]
        execute: bool,
    },

    /// Finish a task as `done` (re-parses HEAD's trailers) or `blocked`.
    FinishTask {
        #[arg(long)]
        feat: String,
        #[arg(long)]
        task: String,
        #[arg(long, value_enum)]
        result: FinishResult,
    },

    /// Archive a `done`/`abandoned` feat: relocate state, remove the
    /// worktree, delete the branch (best-effort), drop the index entry.
    ArchiveFeat {
        #[arg(long)]
        feat: String,
    },

    /// Structural validation of every SSOT document (no VCS calls).
    ValidateHarness,

    /// Full cross-reference audit: SSOT vs. filesystem vs. VCS registry.
    DiagnoseHarness,

    /// List every active feat in the index.
    ListFeats,

    /// Print one feat's index descriptor.
    GetFeat {
        #[arg(long)]
        feat: String,
    },

    /// List active feats whose status matches.
    FilterFeats {
        #[arg(long, value_enum)]
        status: FeatStatusArg,
    },
}

/// Resolve a `--strict`/`--no-strict` pair the way the teacher resolves
/// paired flags in `main.rs` (`flag_pair`): explicit flags win over the
/// default.
pub fn resolve_strict(strict: bool, no_strict: bool, default: bool) -> bool {
    match (strict, no_strict) {
        (true, _) => true,
        (_, true) => false,
        _ => default,
    }
}
