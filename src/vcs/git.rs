//! `git`-backed implementation of [`Vcs`].
//!
//! Grounded directly on the teacher's `Repository::run_command` /
//! `run_command_check` (flat `src/git.rs`): every operation shells out via
//! `std::process::Command`, never swallows stderr, and returns exit-code +
//! stderr to the caller, per spec §4.2's "adapter never swallows VCS
//! errors".

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::FtError;

use super::Vcs;

#[derive(Debug, Clone)]
pub struct GitVcs {
    repo_root: PathBuf,
}

impl GitVcs {
    pub fn at(repo_root: impl Into<PathBuf>) -> Self {
        GitVcs {
            repo_root: repo_root.into(),
        }
    }

    fn run_in(&self, cwd: &Path, args: &[&str]) -> Result<String, FtError> {
        let mut cmd = Command::new("git");
        cmd.args(args);
        cmd.current_dir(cwd);
        let output = cmd.output().map_err(|e| FtError::VcsFailure {
            command: format!("git {}", args.join(" ")),
            stderr: e.to_string(),
            exit_code: None,
        })?;
        if !output.status.success() {
            return Err(FtError::VcsFailure {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run(&self, args: &[&str]) -> Result<String, FtError> {
        self.run_in(&self.repo_root, args)
    }

    fn check(&self, args: &[&str]) -> Result<bool, FtError> {
        let mut cmd = Command::new("git");
        cmd.args(args);
        cmd.current_dir(&self.repo_root);
        let output = cmd.output().map_err(|e| FtError::VcsFailure {
            command: format!("git {}", args.join(" ")),
            stderr: e.to_string(),
            exit_code: None,
        })?;
        Ok(output.status.success())
    }
}

impl Vcs for GitVcs {
    fn current_base_branch(&self) -> Result<String, FtError> {
        let stdout = self.run(&["branch", "--show-current"])?;
        let branch = stdout.trim();
        if !branch.is_empty() {
            return Ok(branch.to_string());
        }
        // Detached HEAD (e.g. freshly initialized repo's default ref before
        // the first commit's branch is checked out): fall back to the
        // remote's default branch, then to "main".
        if let Ok(remote_head) = self.run(&["symbolic-ref", "refs/remotes/origin/HEAD"]) {
            if let Some(name) = remote_head.trim().rsplit('/').next() {
                return Ok(name.to_string());
            }
        }
        Ok("main".to_string())
    }

    fn create_feat_branch(&self, feat_id: &str, from: &str) -> Result<String, FtError> {
        let branch = format!("feat/{feat_id}");
        if self.check(&["rev-parse", "--verify", &format!("refs/heads/{branch}")])? {
            return Err(FtError::InvalidTransition {
                reason: format!("branch {branch} already exists"),
            });
        }
        self.run(&["branch", &branch, from])?;
        Ok(branch)
    }

    fn add_worktree(&self, path: &Path, branch: &str) -> Result<(), FtError> {
        if path.exists() && path.read_dir().is_ok_and(|mut it| it.next().is_some()) {
            return Err(FtError::InvalidTransition {
                reason: format!("worktree path {} exists and is non-empty", path.display()),
            });
        }
        let path_str = path.to_string_lossy().into_owned();
        self.run(&["worktree", "add", &path_str, branch])?;
        Ok(())
    }

    fn remove_worktree(&self, path: &Path, force: bool) -> Result<(), FtError> {
        if !force && !self.worktree_is_clean(path)? {
            return Err(FtError::InvalidTransition {
                reason: format!("worktree {} has uncommitted changes", path.display()),
            });
        }
        let path_str = path.to_string_lossy().into_owned();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path_str);
        self.run(&args)?;
        Ok(())
    }

    fn list_worktrees(&self) -> Result<BTreeSet<PathBuf>, FtError> {
        let stdout = self.run(&["worktree", "list", "--porcelain"])?;
        Ok(stdout
            .lines()
            .filter_map(|line| line.strip_prefix("worktree "))
            .map(PathBuf::from)
            .collect())
    }

    fn is_merged(&self, branch: &str, into: &str) -> Result<bool, FtError> {
        self.check(&["merge-base", "--is-ancestor", branch, into])
    }

    fn delete_branch(&self, branch: &str, force: bool) -> Result<(), FtError> {
        let flag = if force { "-D" } else { "-d" };
        self.run(&["branch", flag, branch])?;
        Ok(())
    }

    fn worktree_is_clean(&self, path: &Path) -> Result<bool, FtError> {
        let stdout = self.run_in(path, &["status", "--porcelain"])?;
        Ok(stdout.trim().is_empty())
    }

    fn head_message(&self, path: &Path) -> Result<String, FtError> {
        self.run_in(path, &["show", "-s", "--format=%B", "HEAD"])
    }

    fn head_sha(&self, path: &Path) -> Result<String, FtError> {
        Ok(self.run_in(path, &["rev-parse", "HEAD"])?.trim().to_string())
    }

    fn worktree_head_branch(&self, path: &Path) -> Result<String, FtError> {
        Ok(self
            .run_in(path, &["rev-parse", "--abbrev-ref", "HEAD"])?
            .trim()
            .to_string())
    }

    fn commit_with_message_file(&self, worktree: &Path, message_file: &Path) -> Result<String, FtError> {
        self.run_in(worktree, &["add", "-A"])?;
        let message_file = message_file.to_string_lossy().into_owned();
        self.run_in(worktree, &["commit", "-F", &message_file])?;
        self.head_sha(worktree)
    }
}
