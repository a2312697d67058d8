//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

/// Get the binary to test, isolated from the caller's environment.
fn shipflow(project: &assert_fs::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("shipflow").unwrap();
    cmd.env_remove("WORKFLOW_GATE_MODE")
        .env_remove("WORKFLOW_PROJECT_DIR")
        .env("XDG_CONFIG_HOME", project.path())
        .arg("--project-dir")
        .arg(project.path());
    cmd
}

fn read_state(project: &assert_fs::TempDir) -> serde_json::Value {
    let content =
        std::fs::read_to_string(project.path().join(".workflow/workflow-state.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    Command::cargo_bin("shipflow")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stage-gated orchestration"));
}

#[test]
fn test_version_flag() {
    Command::cargo_bin("shipflow")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_hook_help_lists_events() {
    Command::cargo_bin("shipflow")
        .unwrap()
        .args(["hook", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("agent-result").and(predicate::str::contains("guard")));
}

// ============================================================================
// Command Tests
// ============================================================================

#[test]
fn test_status_without_run() {
    let temp = assert_fs::TempDir::new().unwrap();

    shipflow(&temp)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("no_active_workflow"));

    temp.close().unwrap();
}

#[test]
fn test_start_missing_document() {
    let temp = assert_fs::TempDir::new().unwrap();

    shipflow(&temp)
        .args(["start", "missing.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not found"));

    temp.child(".workflow/workflow-state.json").assert(predicate::path::missing());
    temp.close().unwrap();
}

#[test]
fn test_start_then_status() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("prd.md").write_str("# Product\n").unwrap();

    shipflow(&temp)
        .args(["start", "prd.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("prd-analyzer"));

    temp.child(".workflow/workflow-state.json").assert(predicate::path::exists());

    shipflow(&temp)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"current_stage\": \"requirements_analysis\""));

    temp.close().unwrap();
}

#[test]
fn test_resume_without_anything() {
    let temp = assert_fs::TempDir::new().unwrap();

    shipflow(&temp)
        .arg("resume")
        .assert()
        .success()
        .stdout(predicate::str::contains("no_workflow_to_resume"));

    temp.close().unwrap();
}

#[test]
fn test_gate_exit_code() {
    let temp = assert_fs::TempDir::new().unwrap();

    shipflow(&temp)
        .args(["gate", "requirements_analysis", "plan_generation"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("requirements.json missing or has no features"));

    temp.child(".workflow/requirements.json").write_str(r#"{"features": ["login"]}"#).unwrap();

    shipflow(&temp)
        .args(["gate", "requirements", "plan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"allowed\": true"));

    temp.close().unwrap();
}

#[test]
fn test_gate_rejects_unknown_stage() {
    let temp = assert_fs::TempDir::new().unwrap();

    shipflow(&temp).args(["gate", "nowhere", "testing"]).assert().failure();

    temp.close().unwrap();
}

#[test]
fn test_config_shows_defaults() {
    let temp = assert_fs::TempDir::new().unwrap();

    shipflow(&temp)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("mode = \"strict\""));

    temp.close().unwrap();
}

#[test]
fn test_completions_bash() {
    Command::cargo_bin("shipflow")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shipflow"));
}

// ============================================================================
// Hook Tests
// ============================================================================

#[test]
fn test_hook_prompt_starts_workflow() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("docs/prd.md").write_str("# Product\n").unwrap();

    shipflow(&temp)
        .args(["hook", "prompt"])
        .write_stdin(r#"{"prompt": "workflow start docs/prd.md"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("workflowCommand"));

    assert_eq!(read_state(&temp)["source_document"], "docs/prd.md");
    temp.close().unwrap();
}

#[test]
fn test_hook_prompt_loop_entry_point() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("docs/prd.md").write_str("# Product\n").unwrap();

    shipflow(&temp)
        .args(["hook", "prompt"])
        .write_stdin(r#"{"prompt": "/ralph-loop Build it with PRD at docs/prd.md"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"action\":\"start\""));
    assert_eq!(read_state(&temp)["source_document"], "docs/prd.md");

    shipflow(&temp)
        .args(["hook", "prompt"])
        .write_stdin(r#"{"prompt": "/ralph-loop"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("No PRD path detected after /ralph-loop"));

    temp.close().unwrap();
}

#[test]
fn test_hook_prompt_routes_other_text() {
    let temp = assert_fs::TempDir::new().unwrap();

    shipflow(&temp)
        .args(["hook", "prompt"])
        .write_stdin(r#"{"prompt": "please run the tests"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("test-runner-fixer"));

    temp.close().unwrap();
}

#[test]
fn test_hooks_ignore_malformed_input() {
    let temp = assert_fs::TempDir::new().unwrap();

    for hook in ["prompt", "agent-result", "track", "checkpoint", "escalate", "guard"] {
        shipflow(&temp)
            .args(["hook", hook])
            .write_stdin("this is not json")
            .assert()
            .success()
            .stdout(predicate::str::is_empty());
    }

    temp.close().unwrap();
}

#[test]
fn test_hook_agent_result_advances_run() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("prd.md").write_str("# Product\n").unwrap();
    shipflow(&temp).args(["start", "prd.md"]).assert().success();
    temp.child(".workflow/requirements.json").write_str(r#"{"features": ["login"]}"#).unwrap();

    shipflow(&temp)
        .args(["hook", "agent-result"])
        .write_stdin(r#"{"agent_name": "prd-analyzer", "result": {"success": true}}"#)
        .assert()
        .success();

    let state = read_state(&temp);
    assert_eq!(state["current_stage"], "plan_generation");
    assert_eq!(state["stage_status"]["requirements_analysis"], "completed");

    temp.close().unwrap();
}

#[test]
fn test_hook_agent_result_warn_mode_from_env() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("prd.md").write_str("# Product\n").unwrap();
    shipflow(&temp).args(["start", "prd.md"]).assert().success();

    shipflow(&temp)
        .env("WORKFLOW_GATE_MODE", "warn")
        .args(["hook", "agent-result"])
        .write_stdin(r#"{"agent_name": "prd-analyzer", "result": {"success": true}}"#)
        .assert()
        .success();

    let state = read_state(&temp);
    assert_eq!(state["current_stage"], "plan_generation");
    assert_eq!(state["gate_warnings"].as_array().unwrap().len(), 1);

    temp.close().unwrap();
}

#[test]
fn test_hook_checkpoint_reports_snapshot() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("prd.md").write_str("# Product\n").unwrap();
    shipflow(&temp).args(["start", "prd.md"]).assert().success();

    shipflow(&temp)
        .args(["hook", "checkpoint"])
        .write_stdin(r#"{"stop_reason": "user_exit"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("checkpointCreated"));

    temp.child(".workflow/checkpoints").assert(predicate::path::is_dir());
    temp.close().unwrap();
}

#[test]
fn test_hook_guard_blocks_dangerous_command() {
    let temp = assert_fs::TempDir::new().unwrap();

    shipflow(&temp)
        .args(["hook", "guard"])
        .write_stdin(r#"{"tool_name": "Bash", "tool_input": {"command": "sudo rm -rf /var"}}"#)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("BLOCKED"));

    temp.close().unwrap();
}

#[test]
fn test_hook_guard_asks_for_confirmation() {
    let temp = assert_fs::TempDir::new().unwrap();

    shipflow(&temp)
        .args(["hook", "guard"])
        .write_stdin(r#"{"tool_name": "Bash", "tool_input": {"command": "rm -rf build"}}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"permissionDecision\":\"ask\""));

    temp.close().unwrap();
}

#[test]
fn test_hook_guard_protects_env_files() {
    let temp = assert_fs::TempDir::new().unwrap();

    shipflow(&temp)
        .args(["hook", "guard"])
        .write_stdin(r#"{"tool_name": "Edit", "tool_input": {"file_path": ".env.local"}}"#)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("PROTECTED"));

    temp.close().unwrap();
}
