//! Error taxonomy for the harness.
//!
//! Mirrors the teacher's hand-rolled `GitError` pattern (a flat enum with a
//! `Display` impl and no `thiserror` macro) rather than introducing a new
//! dependency for something this small. Every variant names the offending
//! feat/task/path so the message is diagnosable without re-running with
//! more verbosity.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum FtError {
    /// Requested entity does not exist on disk.
    NotFound { what: String },
    /// JSON failed to parse or a required key was missing.
    Corrupt { path: PathBuf, reason: String },
    /// A lifecycle transition's precondition was not satisfied.
    InvalidTransition { reason: String },
    /// A commit message failed §4.6 validation.
    InvalidCommit { reason: String },
    /// HEAD commit trailers don't match the task being finished.
    TrailerMismatch { expected: String, found: String },
    /// The VCS adapter returned a non-zero exit code.
    VcsFailure {
        command: String,
        stderr: String,
        exit_code: Option<i32>,
    },
    /// No configured gate command succeeded.
    GateFailure { reason: String },
    /// Filesystem I/O failed outside of the SSOT store's own write path.
    Io { context: String, source: String },
    /// Archive post-conditions found a worktree registration the archive
    /// step could not clear.
    StaleWorktreeRegistration { path: PathBuf },
}

impl FtError {
    /// Exit code contract from spec §7.
    pub fn exit_code(&self) -> i32 {
        match self {
            FtError::NotFound { .. } => 3,
            FtError::Corrupt { .. } => 5,
            FtError::InvalidTransition { .. } => 3,
            FtError::InvalidCommit { .. } => 3,
            FtError::TrailerMismatch { .. } => 3,
            FtError::VcsFailure { .. } => 4,
            FtError::GateFailure { .. } => 3,
            FtError::Io { .. } => 5,
            FtError::StaleWorktreeRegistration { .. } => 3,
        }
    }
}

impl fmt::Display for FtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtError::NotFound { what } => write!(f, "not found: {what}"),
            FtError::Corrupt { path, reason } => {
                write!(f, "corrupt SSOT document at {}: {reason}", path.display())
            }
            FtError::InvalidTransition { reason } => write!(f, "invalid transition: {reason}"),
            FtError::InvalidCommit { reason } => write!(f, "invalid commit message: {reason}"),
            FtError::TrailerMismatch { expected, found } => write!(
                f,
                "commit trailers do not match task: expected {expected}, found {found}"
            ),
            FtError::VcsFailure {
                command,
                stderr,
                exit_code,
            } => write!(
                f,
                "vcs command `{command}` failed (exit {}): {stderr}",
                exit_code.map_or("signal".to_string(), |c| c.to_string())
            ),
            FtError::GateFailure { reason } => write!(f, "quality gate failed: {reason}"),
            FtError::Io { context, source } => write!(f, "io error ({context}): {source}"),
            FtError::StaleWorktreeRegistration { path } => write!(
                f,
                "stale worktree registration at {}: prune with `git worktree prune`",
                path.display()
            ),
        }
    }
}

impl std::error::Error for FtError {}

/// Walk an `anyhow::Error`'s cause chain looking for an `FtError`, falling
/// back to the generic IO exit code when the failure originated outside
/// this crate's taxonomy (e.g. a clap parse error reaching main by mistake).
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<FtError>()
        .map(FtError::exit_code)
        .unwrap_or(5)
}
