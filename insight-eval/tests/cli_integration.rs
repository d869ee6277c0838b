//! CLI integration tests for the insight-eval binary.
//!
//! Only commands that never reach a model server are exercised here; runs
//! that would score metrics are covered in `orchestrator.rs` with scripted
//! backends.

mod common;

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

// =============================================================================
// Helper Functions
// =============================================================================

fn insight_eval_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_insight-eval"))
}

fn run_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(insight_eval_bin())
        .args(args)
        .current_dir(dir)
        .env_remove("INSIGHT_EVAL_PROVIDER")
        .env_remove("INSIGHT_EVAL_MODEL")
        .env_remove("INSIGHT_EVAL_BASE_URL")
        .env("RUST_LOG", "error")
        .output()
        .expect("Failed to execute insight-eval binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "Expected exit code 0, got {:?}\nstderr: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn write_sample_csv(dir: &Path) -> PathBuf {
    let path = dir.join("sales.csv");
    std::fs::write(&path, common::SAMPLE_CSV).unwrap();
    path
}

// =============================================================================
// init-config
// =============================================================================

#[test]
fn test_init_config_writes_loadable_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(dir.path(), &["init-config", "--output", "conf/eval.toml"]);
    assert_success(&output);

    let path = dir.path().join("conf").join("eval.toml");
    let config = insight_eval::Config::from_file(&path).unwrap();
    assert_eq!(config.evaluation.metrics.len(), 5);
}

#[test]
fn test_init_config_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    assert_success(&run_in(dir.path(), &["init-config", "--output", "eval.toml"]));

    let output = run_in(dir.path(), &["init-config", "--output", "eval.toml"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("bad.toml"),
        "[evaluation]\nmetrics = [\"correctness\", \"correctness\"]\n",
    )
    .unwrap();

    let output = run_in(dir.path(), &["--config", "bad.toml", "health"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("more than once"));
}

// =============================================================================
// generate-claims
// =============================================================================

#[test]
fn test_generate_claims_writes_validation_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_sample_csv(dir.path());

    let output = run_in(
        dir.path(),
        &[
            "generate-claims",
            "--data",
            data.to_str().unwrap(),
            "--num-claims",
            "6",
            "--output",
            "claims.json",
        ],
    );
    assert_success(&output);
    assert!(stdout(&output).contains("Generated"));

    let dataset =
        insight_eval::validation::ValidationDataset::load(dir.path().join("claims.json")).unwrap();
    assert!(!dataset.claims.is_empty());
    assert!(dataset.claims.len() <= 6);
}

#[test]
fn test_generate_claims_missing_data_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(dir.path(), &["generate-claims", "--data", "nope.csv"]);
    assert!(!output.status.success());
}

// =============================================================================
// evaluate / batch
// =============================================================================

#[test]
fn test_evaluate_empty_claim_reports_failed_run() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_sample_csv(dir.path());

    let output = run_in(
        dir.path(),
        &["evaluate", "", "--data", data.to_str().unwrap(), "--output", "out"],
    );
    assert_success(&output);
    let text = stdout(&output);
    assert!(text.contains("Status: failed"));
    assert!(text.contains("claim must not be empty"));

    let saved: Vec<_> = std::fs::read_dir(dir.path().join("out"))
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(saved.len(), 1);
    let content = std::fs::read_to_string(saved[0].path()).unwrap();
    assert!(content.contains("\"run_status\": \"failed\""));
}

#[test]
fn test_batch_requires_claims() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("claims.txt"), "# nothing here\n\n").unwrap();

    let output = run_in(dir.path(), &["batch", "-f", "claims.txt"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no claims found"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(dir.path(), &["frobnicate"]);
    assert!(!output.status.success());
}
