//! Harness-wide configuration (spec §3 Config, §6 filesystem layout).
//!
//! `config.json` is a normal [`ssot::Document`] — it gets the same
//! lock/load/validate/atomic-write treatment as every other SSOT file, it
//! just happens to have exactly one instance per repository instead of
//! one per feat.

use std::path::Path;

use crate::error::FtError;
use crate::ssot;
use crate::ssot::schema::HarnessConfig;
use crate::vcs::Vcs;

/// Load `config.json`. `NotFound` propagates as-is so callers can tell
/// "harness not initialized" apart from a corrupt document.
pub fn load(path: &Path) -> Result<HarnessConfig, FtError> {
    ssot::load(path)
}

/// `initialize-harness`: create `config.json` and an empty `index/feats.json`
/// if they do not already exist. `base_branch` defaults to whatever the VCS
/// reports as the current branch at initialization time (spec §3 "Config
/// gains explicit defaults").
pub fn initialize(
    vcs: &dyn Vcs,
    config_path: &Path,
    index_path: &Path,
    base_branch_override: Option<&str>,
) -> Result<HarnessConfig, FtError> {
    if config_path.exists() {
        return Err(FtError::InvalidTransition {
            reason: format!("{} already exists", config_path.display()),
        });
    }
    let base_branch = match base_branch_override {
        Some(b) => b.to_string(),
        None => vcs.current_base_branch()?,
    };
    let config = HarnessConfig {
        schema_version: crate::ssot::schema::SCHEMA_VERSION,
        base_branch,
        worktrees_root: ".worktrees".to_string(),
        gate: Default::default(),
        archive: Default::default(),
        doctor: Default::default(),
        extra: Default::default(),
    };
    ssot::create(config_path, &config)?;
    if !index_path.exists() {
        ssot::create(index_path, &crate::ssot::schema::FeatsIndex::default())?;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::FakeVcs;
    use tempfile::tempdir;

    #[test]
    fn initialize_writes_config_and_empty_index() {
        let dir = tempdir().unwrap();
        let vcs = FakeVcs::new("main");
        let config_path = dir.path().join("config.json");
        let index_path = dir.path().join("index/feats.json");

        let config = initialize(&vcs, &config_path, &index_path, None).unwrap();
        assert_eq!(config.base_branch, "main");
        assert!(config_path.exists());
        assert!(index_path.exists());
    }

    #[test]
    fn initialize_twice_fails() {
        let dir = tempdir().unwrap();
        let vcs = FakeVcs::new("main");
        let config_path = dir.path().join("config.json");
        let index_path = dir.path().join("index/feats.json");

        initialize(&vcs, &config_path, &index_path, None).unwrap();
        assert!(initialize(&vcs, &config_path, &index_path, None).is_err());
    }
}
