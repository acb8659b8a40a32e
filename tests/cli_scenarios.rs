//! End-to-end scenarios S1/S2 (spec "End-to-end scenarios"), driven through
//! the real `ft` binary against a real git repository. Grounded on the
//! teacher's `tests/common/mod.rs` git-isolation pattern (deterministic
//! author/committer env, `GIT_CONFIG_GLOBAL` pointed at a throwaway file) —
//! simplified to a single inline helper since this crate has one fixture
//! shape (a bare repo with one commit) rather than the teacher's many.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn git_env(cmd: &mut Command) {
    cmd.env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_TERMINAL_PROMPT", "0");
}

fn git(dir: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(dir);
    git_env(&mut cmd);
    cmd.output().expect("git is available in the test environment")
}

fn ft(dir: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ft"));
    cmd.arg("--root").arg(dir).arg("--json").args(args);
    git_env(&mut cmd);
    cmd.output().expect("the ft binary ran")
}

fn json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout)
        .unwrap_or_else(|e| panic!("expected JSON stdout, got {:?}: {e}", String::from_utf8_lossy(&output.stdout)))
}

/// A fresh repo with a single commit on `main`, ready for `initialize-harness`.
fn init_repo() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(git(dir.path(), &["init", "--initial-branch=main"]).status.success());
    std::fs::write(dir.path().join("README.md"), "init\n").unwrap();
    assert!(git(dir.path(), &["add", "."]).status.success());
    assert!(git(dir.path(), &["commit", "-m", "init"]).status.success());
    dir
}

fn configure_non_ui_gate(repo: &Path, commands: &[&str], mode: &str) {
    let config_path = repo.join(".bagakit/ft-harness/config.json");
    let raw = std::fs::read_to_string(&config_path).unwrap();
    let mut value: Value = serde_json::from_str(&raw).unwrap();
    value["gate"]["project_type"] = Value::String("non_ui".into());
    value["gate"]["non_ui_commands"] = Value::Array(commands.iter().map(|c| Value::String((*c).into())).collect());
    value["gate"]["non_ui_mode"] = Value::String(mode.into());
    std::fs::write(&config_path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
}

#[test]
fn s1_happy_path_from_create_feat_through_archive() {
    let repo = init_repo();
    let root = repo.path();

    assert!(ft(root, &["initialize-harness"]).status.success());
    configure_non_ui_gate(root, &["bash -lc 'true'"], "any");

    let created = ft(
        root,
        &[
            "create-feat",
            "--title",
            "Demo Feat",
            "--slug",
            "demo-feat",
            "--goal",
            "Validate full loop",
        ],
    );
    assert!(created.status.success(), "{:?}", created);
    let created = json(&created);
    assert_eq!(created["feat_id"], "F-demo-feat-001");
    let worktree = created["worktree"].as_str().unwrap().to_string();
    assert!(Path::new(&worktree).join(".git").exists());

    let started = ft(root, &["start-task", "--feat", "F-demo-feat-001", "--title", "do the thing"]);
    assert!(started.status.success(), "{:?}", started);
    let started = json(&started);
    let task_id = started["task_id"].as_str().unwrap().to_string();
    assert_eq!(task_id, "T-001");

    let gated = ft(root, &["run-task-gate", "--feat", "F-demo-feat-001", "--task", &task_id]);
    assert!(gated.status.success(), "{:?}", gated);
    assert_eq!(json(&gated)["gate_result"], "pass");

    std::fs::write(Path::new(&worktree).join("notes.txt"), "did the thing\n").unwrap();

    let prepared = ft(
        root,
        &[
            "prepare-task-commit",
            "--feat",
            "F-demo-feat-001",
            "--task",
            &task_id,
            "--summary",
            "Implement T-001",
            "--plan",
            "write notes.txt",
            "--check",
            "gate passed",
            "--learn",
            "nothing surprising",
            "--execute",
        ],
    );
    assert!(prepared.status.success(), "{:?}", prepared);
    assert!(json(&prepared)["commit_sha"].as_str().unwrap().len() >= 7);

    let finished = ft(root, &["finish-task", "--feat", "F-demo-feat-001", "--task", &task_id, "--result", "done"]);
    assert!(finished.status.success(), "{:?}", finished);
    assert_eq!(json(&finished)["status"], "done");
    assert_eq!(json(&finished)["feat_status"], "done");

    assert!(git(root, &["merge", "--no-ff", "feat/F-demo-feat-001"]).status.success());

    let archived = ft(root, &["archive-feat", "--feat", "F-demo-feat-001"]);
    assert!(archived.status.success(), "{:?}", archived);
    assert_eq!(json(&archived)["status"], "archived");

    let doctor = ft(root, &["diagnose-harness"]);
    assert!(doctor.status.success(), "{:?}", doctor);
    let list = ft(root, &["list-feats"]);
    assert!(list.status.success());
    assert_eq!(json(&list), Value::Array(vec![]));
}

#[test]
fn s2_blocked_task_cannot_be_archived() {
    let repo = init_repo();
    let root = repo.path();

    assert!(ft(root, &["initialize-harness"]).status.success());
    configure_non_ui_gate(root, &["bash -lc 'false'"], "any");

    let created = json(&ft(
        root,
        &["create-feat", "--title", "Demo Feat", "--slug", "demo-feat", "--goal", "Validate blocked path"],
    ));
    let feat_id = created["feat_id"].as_str().unwrap().to_string();

    let started = json(&ft(root, &["start-task", "--feat", &feat_id, "--title", "do the thing"]));
    let task_id = started["task_id"].as_str().unwrap().to_string();

    let gated = ft(root, &["run-task-gate", "--feat", &feat_id, "--task", &task_id]);
    assert!(!gated.status.success());
    assert_eq!(gated.status.code(), Some(3), "GateFailure must map to exit code 3");

    let finished = ft(root, &["finish-task", "--feat", &feat_id, "--task", &task_id, "--result", "blocked"]);
    assert!(finished.status.success(), "{:?}", finished);
    assert_eq!(json(&finished)["status"], "blocked");

    let archived = ft(root, &["archive-feat", "--feat", &feat_id]);
    assert!(!archived.status.success());
    assert_eq!(archived.status.code(), Some(3), "InvalidTransition must map to exit code 3");
}
