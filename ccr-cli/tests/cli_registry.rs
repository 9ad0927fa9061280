use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn ccr_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ccr-registry"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("CCR_PROJECTS_FILE")
        .env_remove("RUST_LOG");
    cmd
}

fn project_tree() -> TempDir {
    let dir = TempDir::new().expect("project");
    let agents = dir.path().join("_bmad/bmm/agents");
    let workflow = dir.path().join("_bmad/bmm/workflows/plan");
    fs::create_dir_all(&agents).expect("mkdir agents");
    fs::create_dir_all(&workflow).expect("mkdir workflow");
    fs::write(agents.join("dev.md"), "# Dev\n").expect("write agent");
    fs::write(workflow.join("workflow.yaml"), "name: plan\ndescription: Plan it\n")
        .expect("write workflow");
    dir
}

fn registered(home: &TempDir, tree: &TempDir) -> serde_json::Value {
    ccr_cmd(home.path())
        .args(["project", "add"])
        .arg(tree.path())
        .assert()
        .success();
    let output = ccr_cmd(home.path())
        .args(["project", "list", "--json"])
        .output()
        .expect("run list");
    let projects: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    projects[0].clone()
}

#[test]
fn empty_registry_lists_nothing() {
    let home = TempDir::new().expect("home");
    ccr_cmd(home.path())
        .args(["project", "list"])
        .assert()
        .success()
        .stdout(contains("No projects registered."));
}

#[test]
fn add_then_show_reports_resources() {
    let home = TempDir::new().expect("home");
    let tree = project_tree();
    let project = registered(&home, &tree);
    let id = project["id"].as_str().expect("id");

    assert_eq!(project["agents"].as_array().map(Vec::len), Some(1));
    assert_eq!(project["workflows"][0]["description"], "Plan it");

    ccr_cmd(home.path())
        .args(["project", "show", id])
        .assert()
        .success()
        .stdout(contains("dev.md").and(contains("plan")));

    assert!(home.path().join(".claude-code-router/projects.json").exists());
}

#[test]
fn secret_model_is_refused() {
    let home = TempDir::new().expect("home");
    let tree = project_tree();
    let project = registered(&home, &tree);
    let id = project["id"].as_str().expect("id");
    let agent = project["agents"][0]["id"].as_str().expect("agent id");

    ccr_cmd(home.path())
        .args(["agent", "set-model", id, agent, "sk-test-abc123,gpt-4o"])
        .assert()
        .failure()
        .stderr(contains("abc123").not());

    ccr_cmd(home.path())
        .args(["lookup", "agent", agent])
        .assert()
        .success()
        .stdout(contains("not configured"));
}

#[test]
fn workflow_set_and_lookup() {
    let home = TempDir::new().expect("home");
    let tree = project_tree();
    let project = registered(&home, &tree);
    let id = project["id"].as_str().expect("id");
    let workflow = project["workflows"][0]["id"].as_str().expect("workflow id");

    ccr_cmd(home.path())
        .args(["workflow", "set", id, workflow, "--model", "deepseek,deepseek-chat", "--mode", "inherit"])
        .assert()
        .success();

    let output = ccr_cmd(home.path())
        .args(["lookup", "workflow", workflow, "--json"])
        .output()
        .expect("run lookup");
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(payload["status"], "configured");
    assert_eq!(payload["model"], "deepseek,deepseek-chat");
    assert_eq!(payload["inheritance_mode"], "inherit");
    assert_eq!(payload["project"], id);
}

#[test]
fn stale_expectation_is_rejected() {
    let home = TempDir::new().expect("home");
    let tree = project_tree();
    let project = registered(&home, &tree);
    let id = project["id"].as_str().expect("id");
    let agent = project["agents"][0]["id"].as_str().expect("agent id");

    ccr_cmd(home.path())
        .args([
            "agent",
            "set-model",
            id,
            agent,
            "openai,gpt-4o",
            "--expect-updated-at",
            "2000-01-01T00:00:00Z",
        ])
        .assert()
        .failure()
        .stderr(contains("modified concurrently"));
}

#[test]
fn rescan_reports_deleted_agent() {
    let home = TempDir::new().expect("home");
    let tree = project_tree();
    let project = registered(&home, &tree);
    let id = project["id"].as_str().expect("id");

    fs::remove_file(tree.path().join("_bmad/bmm/agents/dev.md")).expect("rm agent");
    let output = ccr_cmd(home.path())
        .args(["project", "rescan", id, "--json"])
        .output()
        .expect("run rescan");
    assert!(output.status.success());
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(result["deleted_agents"], serde_json::json!(["dev.md"]));
    assert_eq!(result["total_agents"], 0);
}

#[test]
fn registry_flag_overrides_location() {
    let home = TempDir::new().expect("home");
    let elsewhere = TempDir::new().expect("elsewhere");
    let registry = elsewhere.path().join("custom.json");
    let tree = project_tree();

    ccr_cmd(home.path())
        .arg("--registry")
        .arg(&registry)
        .args(["project", "add"])
        .arg(tree.path())
        .assert()
        .success();

    assert!(registry.exists());
    assert!(!home.path().join(".claude-code-router/projects.json").exists());
}

#[test]
fn unknown_project_fails_with_message() {
    let home = TempDir::new().expect("home");
    ccr_cmd(home.path())
        .args(["project", "rescan", "6f1f2a4e-8d3b-4c6a-9e2f-1a2b3c4d5e6f"])
        .assert()
        .failure()
        .stderr(contains("project not found"));
}
