//! CLI integration tests for the Calrissian command-line interface.
//!
//! These tests verify:
//! - Help text is displayed correctly
//! - Argument parsing works as expected
//! - Offline rendering produces applyable manifests
//!
//! Note: These tests do not require a cluster.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const WORKFLOW: &str = r##"cwlVersion: v1.0
$graph:
  - class: Workflow
    id: main
    inputs: []
    outputs: []
    steps: []
"##;

/// Get a command for the calrissian binary, isolated from user config.
fn calrissian(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("calrissian").unwrap();
    cmd.env("CALRISSIAN_CONFIG_DIR", config_dir.path())
        .env_remove("CALRISSIAN_IMAGE")
        .env_remove("CALRISSIAN_NAMESPACE")
        .env_remove("CALRISSIAN_CONFIG")
        .env_remove("CALRISSIAN_WDIR_CLAIM")
        .env_remove("CALRISSIAN_SERVICE_ACCOUNT")
        .env_remove("CALRISSIAN_STORAGE_CLASS")
        .env_remove("CALRISSIAN_KUBECONFIG")
        .env_remove("CALRISSIAN_KUBE_CONTEXT")
        .env_remove("CALRISSIAN_IN_CLUSTER")
        .env_remove("CALRISSIAN_MONITOR_INTERVAL")
        .current_dir(config_dir.path());
    cmd
}

fn write_inputs(dir: &TempDir) -> (String, String) {
    let cwl = dir.path().join("app.cwl");
    let params = dir.path().join("params.yml");
    std::fs::write(&cwl, WORKFLOW).unwrap();
    std::fs::write(&params, "message: hello\n").unwrap();
    (
        cwl.display().to_string(),
        params.display().to_string(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    let dir = TempDir::new().unwrap();
    calrissian(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Calrissian"))
        .stdout(predicate::str::contains("Kubernetes jobs"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    calrissian(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("calrissian"));
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    calrissian(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("monitor"))
        .stdout(predicate::str::contains("logs"))
        .stdout(predicate::str::contains("output"))
        .stdout(predicate::str::contains("usage"))
        .stdout(predicate::str::contains("cleanup"));
}

#[test]
fn test_submit_help_lists_job_flags() {
    let dir = TempDir::new().unwrap();
    calrissian(&dir)
        .args(["submit", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--cwl"))
        .stdout(predicate::str::contains("--calling-workspace"))
        .stdout(predicate::str::contains("--node-selector"))
        .stdout(predicate::str::contains("--wait"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument Validation Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_submit_requires_cwl() {
    let dir = TempDir::new().unwrap();
    calrissian(&dir)
        .args(["submit", "--params", "p.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--cwl"));
}

#[test]
fn test_status_requires_job() {
    let dir = TempDir::new().unwrap();
    calrissian(&dir).arg("status").assert().failure();
}

#[test]
fn test_bad_env_pair_rejected() {
    let dir = TempDir::new().unwrap();
    let (cwl, params) = write_inputs(&dir);
    calrissian(&dir)
        .args(["render", "--cwl", &cwl, "--params", &params, "--env", "NOVALUE"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("KEY=VALUE"));
}

#[test]
fn test_unknown_command_fails() {
    let dir = TempDir::new().unwrap();
    calrissian(&dir).arg("launch").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Render Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_render_prints_bundle() {
    let dir = TempDir::new().unwrap();
    let (cwl, params) = write_inputs(&dir);
    calrissian(&dir)
        .args([
            "--namespace",
            "ades",
            "render",
            "--cwl",
            &cwl,
            "--params",
            &params,
            "--job-id",
            "42",
            "--entry-point",
            "main",
            "--env",
            "AWS_REGION=eu-west-2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("kind: ConfigMap"))
        .stdout(predicate::str::contains("name: cwl-workflow-42"))
        .stdout(predicate::str::contains("name: pod-env-vars-42"))
        .stdout(predicate::str::contains("kind: Job"))
        .stdout(predicate::str::contains("namespace: ades"))
        .stdout(predicate::str::contains("/workflow-input/workflow.cwl#main"))
        .stdout(predicate::str::contains("terradue/calrissian:0.12.0"));
}

#[test]
fn test_render_rejects_unknown_entry_point() {
    let dir = TempDir::new().unwrap();
    let (cwl, params) = write_inputs(&dir);
    calrissian(&dir)
        .args([
            "render",
            "--cwl",
            &cwl,
            "--params",
            &params,
            "--entry-point",
            "missing",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"));
}

#[test]
fn test_render_job_only_to_file_uses_config() {
    let dir = TempDir::new().unwrap();
    let (cwl, params) = write_inputs(&dir);
    std::fs::write(
        dir.path().join("calrissian.toml"),
        "[job]\nimage = \"registry.local/calrissian:dev\"\nmax_ram = \"4G\"\n",
    )
    .unwrap();
    let out = dir.path().join("job.yaml");

    calrissian(&dir)
        .args([
            "render",
            "--cwl",
            &cwl,
            "--params",
            &params,
            "--job-only",
            "--output",
            &out.display().to_string(),
        ])
        .assert()
        .success();

    let manifest = std::fs::read_to_string(&out).unwrap();
    assert!(manifest.starts_with("apiVersion: batch/v1"));
    assert!(!manifest.contains("kind: ConfigMap"));
    assert!(manifest.contains("registry.local/calrissian:dev"));
    assert!(manifest.contains("4G"));
    assert!(manifest.contains("namespace: default"));
}

#[test]
fn test_render_reads_environment_overrides() {
    let dir = TempDir::new().unwrap();
    let (cwl, params) = write_inputs(&dir);
    std::fs::write(
        dir.path().join("calrissian.toml"),
        "[context]\nwdir_claim = \"project-wdir\"\nservice_account = \"ades\"\n",
    )
    .unwrap();

    calrissian(&dir)
        .env("CALRISSIAN_WDIR_CLAIM", "shared-wdir")
        .env("CALRISSIAN_MONITOR_INTERVAL", "soon")
        .args(["render", "--cwl", &cwl, "--params", &params, "--job-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("claimName: shared-wdir"))
        .stdout(predicate::str::contains("project-wdir").not())
        .stdout(predicate::str::contains("serviceAccountName: ades"))
        .stderr(predicate::str::contains("CALRISSIAN_MONITOR_INTERVAL"));
}

#[test]
fn test_init_write_config_requires_flag() {
    let dir = TempDir::new().unwrap();
    calrissian(&dir)
        .args(["init", "--force"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--write-config"));
}

#[test]
fn test_submit_without_cluster_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let (cwl, params) = write_inputs(&dir);
    calrissian(&dir)
        .env("KUBECONFIG", dir.path().join("missing-kubeconfig"))
        .args(["submit", "--cwl", &cwl, "--params", &params])
        .assert()
        .failure()
        .stderr(predicate::str::contains("kubeconfig"));
}
