//! JSON document shapes persisted under `.bagakit/ft-harness/` (spec §3, §6).
//!
//! Every top-level document carries `schema_version` and an `extra` bucket
//! for unknown fields, so a future version of the harness can add fields
//! without older builds discarding them on a read-modify-write cycle.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::FtError;
use crate::ssot::Document;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeatStatus {
    Draft,
    Active,
    Done,
    Abandoned,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Planned,
    InProgress,
    Blocked,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GateResult {
    Pass,
    Fail,
    Unknown,
}

impl Default for GateResult {
    fn default() -> Self {
        GateResult::Unknown
    }
}

/// A feat: a deliverable spanning one ordered sequence of tasks (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub id: String,
    pub title: String,
    pub goal: String,
    pub slug: String,
    pub status: FeatStatus,
    /// `None` once archived — the branch no longer exists.
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub worktree_path: Option<String>,
    pub base_branch: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub archived_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Document for FeatState {
    fn schema_version(&self) -> u32 {
        self.schema_version
    }

    fn validate(&self) -> Result<(), FtError> {
        if self.id.is_empty() || self.slug.is_empty() {
            return Err(FtError::Corrupt {
                path: Default::default(),
                reason: "feat state missing id/slug".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GateEvidence {
    pub command: String,
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub signaled: bool,
    pub stdout_path: String,
    pub started_at: String,
    pub finished_at: String,
}

/// A task within a feat (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub gate_result: GateResult,
    #[serde(default)]
    pub gate_evidence: Vec<GateEvidence>,
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
}

impl Task {
    pub fn new(id: String, title: String) -> Self {
        Task {
            id,
            title,
            status: TaskStatus::Planned,
            gate_result: GateResult::Unknown,
            gate_evidence: Vec::new(),
            commit_sha: None,
            started_at: None,
            finished_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskList {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for TaskList {
    fn default() -> Self {
        TaskList {
            schema_version: SCHEMA_VERSION,
            tasks: Vec::new(),
            extra: Default::default(),
        }
    }
}

impl TaskList {
    /// Next task id, scanning for the maximum `T-NNN` and incrementing
    /// (spec §4.5 "Ordering & tie-breaks").
    pub fn next_task_id(&self) -> String {
        let max = self
            .tasks
            .iter()
            .filter_map(|t| crate::util::parse_task_number(&t.id))
            .max()
            .unwrap_or(0);
        crate::util::format_task_id(max + 1)
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn in_progress(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| t.status == TaskStatus::InProgress)
    }
}

impl Document for TaskList {
    fn schema_version(&self) -> u32 {
        self.schema_version
    }

    fn validate(&self) -> Result<(), FtError> {
        // Task ids must be a dense increasing sequence starting at T-001
        // (spec §3 invariants).
        let mut numbers: Vec<u32> = self
            .tasks
            .iter()
            .filter_map(|t| crate::util::parse_task_number(&t.id))
            .collect();
        numbers.sort_unstable();
        for (i, n) in numbers.iter().enumerate() {
            if *n != (i as u32) + 1 {
                return Err(FtError::Corrupt {
                    path: Default::default(),
                    reason: format!("task ids are not a dense increasing sequence: {numbers:?}"),
                });
            }
        }
        let in_progress_count = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .count();
        if in_progress_count > 1 {
            return Err(FtError::Corrupt {
                path: Default::default(),
                reason: "more than one task is in_progress".to_string(),
            });
        }
        for t in &self.tasks {
            if t.status == TaskStatus::Done
                && (t.gate_result != GateResult::Pass || t.commit_sha.is_none())
            {
                return Err(FtError::Corrupt {
                    path: Default::default(),
                    reason: format!("task {} is done without pass+commit_sha", t.id),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub title: String,
    pub status: FeatStatus,
    pub branch: String,
    pub worktree_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatsIndex {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub feats: IndexMap<String, IndexEntry>,
}

impl Default for FeatsIndex {
    fn default() -> Self {
        FeatsIndex {
            schema_version: SCHEMA_VERSION,
            feats: IndexMap::new(),
        }
    }
}

impl Document for FeatsIndex {
    fn schema_version(&self) -> u32 {
        self.schema_version
    }

    fn validate(&self) -> Result<(), FtError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    Ui,
    NonUi,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonUiMode {
    Any,
    All,
}

impl Default for NonUiMode {
    fn default() -> Self {
        NonUiMode::Any
    }
}

/// One ordered predicate for detecting project type from repo contents
/// (spec §4.4): "if `path_exists` is present at the worktree root, the
/// project is `resolves_to`".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectTypeRule {
    pub path_exists: String,
    pub resolves_to: ProjectType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_project_type")]
    pub project_type: ProjectType,
    #[serde(default)]
    pub project_type_rules: Vec<ProjectTypeRule>,
    #[serde(default = "default_ui_evidence_path")]
    pub ui_evidence_path: String,
    #[serde(default)]
    pub non_ui_commands: Vec<String>,
    #[serde(default)]
    pub non_ui_mode: NonUiMode,
    /// Wall-clock deadline per gate command; `None` means no deadline
    /// (spec §5 default).
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

fn default_project_type() -> ProjectType {
    ProjectType::Auto
}

fn default_ui_evidence_path() -> String {
    "ui-verification.md".to_string()
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            project_type: ProjectType::Auto,
            project_type_rules: Vec::new(),
            ui_evidence_path: default_ui_evidence_path(),
            non_ui_commands: Vec::new(),
            non_ui_mode: NonUiMode::Any,
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivePolicy {
    #[serde(default = "default_true")]
    pub require_merged: bool,
    #[serde(default = "default_true")]
    pub require_clean: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ArchivePolicy {
    fn default() -> Self {
        ArchivePolicy {
            require_merged: true,
            require_clean: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorThresholds {
    #[serde(default)]
    pub min_gate_evidence: usize,
}

impl Default for DoctorThresholds {
    fn default() -> Self {
        DoctorThresholds {
            min_gate_evidence: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub base_branch: String,
    #[serde(default = "default_worktrees_root")]
    pub worktrees_root: String,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub archive: ArchivePolicy,
    #[serde(default)]
    pub doctor: DoctorThresholds,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_worktrees_root() -> String {
    ".worktrees".to_string()
}

impl Document for HarnessConfig {
    fn schema_version(&self) -> u32 {
        self.schema_version
    }

    fn validate(&self) -> Result<(), FtError> {
        if self.base_branch.is_empty() {
            return Err(FtError::Corrupt {
                path: Default::default(),
                reason: "config.base_branch must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}
