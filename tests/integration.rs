//! End-to-end integration tests for the worker harness
//!
//! These tests drive the `mock_worker` binary through:
//! 1. The stream transport directly
//! 2. The scenario runner library API
//! 3. The `worker-harness` CLI, checking its exit status and output

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::Duration;

use serde_json::json;
use worker_harness::common::config::Config;
use worker_harness::harness::{run_scenario, ActionOutcome, RunOptions};
use worker_harness::stream::{
    CancelSignal, DuplexChannel, MessageChannel, Received, StreamingMessage, WorkerProcess,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn mock_worker() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mock_worker"))
}

fn options(scenario: &str) -> RunOptions {
    RunOptions {
        scenario: fixture(scenario),
        worker: Some(mock_worker()),
        ..Default::default()
    }
}

/// CLI invocation with an isolated config directory
struct CliContext {
    config_home: tempfile::TempDir,
}

impl CliContext {
    fn new() -> Self {
        Self {
            config_home: tempfile::tempdir().expect("Failed to create config dir"),
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_worker-harness"))
            .args(args)
            .env("XDG_CONFIG_HOME", self.config_home.path())
            .env("HOME", self.config_home.path())
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to run worker-harness")
    }
}

#[tokio::test]
async fn test_worker_transport_round_trip() {
    let (channel, endpoint) = DuplexChannel::new();
    let worker = WorkerProcess::spawn(&mock_worker(), &[], endpoint).unwrap();

    channel
        .send(StreamingMessage::new(
            "init-1",
            "workerInitRequest",
            json!({"hostVersion": "4.0.0"}),
        ))
        .unwrap();

    match channel
        .receive(Duration::from_secs(5), &CancelSignal::never())
        .await
    {
        Received::Message(message) => {
            assert_eq!(message.request_id, "init-1");
            assert_eq!(message.message_type(), Some("workerInitResponse"));
            assert_eq!(message.body().unwrap()["result"]["status"], "Success");
        }
        other => panic!("Expected a message, got {:?}", other),
    }

    worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_worker_exit_closes_channel() {
    let (channel, endpoint) = DuplexChannel::new();
    let _worker = WorkerProcess::spawn(&mock_worker(), &[], endpoint).unwrap();

    channel
        .send(StreamingMessage::new("t", "workerTerminate", json!({})))
        .unwrap();

    let received = channel
        .receive(Duration::from_secs(5), &CancelSignal::never())
        .await;
    assert!(matches!(received, Received::Closed), "got {:?}", received);
}

#[tokio::test]
async fn test_scenario_passes_against_mock_worker() {
    let report = run_scenario(&options("init_and_invoke.yaml"), &Config::default())
        .await
        .unwrap();

    assert!(report.passed(), "{:#?}", report);
    assert_eq!(report.results.len(), 4);
    assert_eq!(report.results[0].name, "init");
    assert_eq!(report.results[3].name, "invoke");
}

#[tokio::test]
async fn test_validator_failure_stops_scenario() {
    let report = run_scenario(&options("wrong_version.yaml"), &Config::default())
        .await
        .unwrap();

    assert!(!report.passed());
    assert_eq!(report.skipped, vec!["never-runs"]);
    match &report.results[0].outcome {
        ActionOutcome::Failed(failure) => {
            assert_eq!(failure.violations.len(), 1);
            assert_eq!(failure.violations[0].query, "$.workerInitResponse.workerVersion");
            assert_eq!(
                failure.violations[0].message,
                "expected \"2.0.0\", got \"1.0.0\""
            );
        }
        other => panic!("Expected failure, got {}", other),
    }
}

#[tokio::test]
async fn test_continue_on_failure_runs_remaining_actions() {
    let mut options = options("wrong_version.yaml");
    options.continue_on_failure = true;

    let report = run_scenario(&options, &Config::default()).await.unwrap();
    assert!(!report.passed());
    assert_eq!(report.results.len(), 2);
    assert!(report.results[1].outcome.is_passed());
}

#[tokio::test]
async fn test_silent_worker_times_out() {
    let report = run_scenario(&options("no_reply.yaml"), &Config::default())
        .await
        .unwrap();

    let result = &report.results[0];
    match &result.outcome {
        ActionOutcome::TimedOut(timeout) => {
            assert_eq!(timeout.timeout, Duration::from_millis(200));
            assert_eq!(
                timeout.pending,
                vec!["messages[0] functionEnvironmentReloadResponse"]
            );
        }
        other => panic!("Expected timeout, got {}", other),
    }
    assert!(result.elapsed >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_invalid_scenario_is_an_error() {
    let err = run_scenario(&options("invalid_action.yaml"), &Config::default())
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("actions[0]: "));
}

#[test]
fn test_cli_run_passing_scenario() {
    let ctx = CliContext::new();
    let worker = mock_worker();
    let scenario = fixture("init_and_invoke.yaml");

    let output = ctx.run(&[
        "run",
        scenario.to_str().unwrap(),
        "--worker",
        worker.to_str().unwrap(),
    ]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {}", stdout);
    assert!(stdout.contains("Scenario Passed"));
}

#[test]
fn test_cli_run_failing_scenario_exits_nonzero() {
    let ctx = CliContext::new();
    let worker = mock_worker();
    let scenario = fixture("wrong_version.yaml");

    let output = ctx.run(&[
        "run",
        scenario.to_str().unwrap(),
        "--worker",
        worker.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Scenario Failed"));
}

#[test]
fn test_cli_uses_worker_from_config() {
    let ctx = CliContext::new();
    let config_dir = ctx.config_home.path().join("worker-harness");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        format!("[worker]\nprogram = {:?}\n", mock_worker().to_str().unwrap()),
    )
    .unwrap();

    let scenario = fixture("init_and_invoke.yaml");
    let output = ctx.run(&["run", scenario.to_str().unwrap()]);

    // Only platforms honouring XDG_CONFIG_HOME pick the file up
    if cfg!(target_os = "linux") {
        assert!(
            output.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

#[test]
fn test_cli_check() {
    let ctx = CliContext::new();

    let valid = ctx.run(&["check", fixture("init_and_invoke.yaml").to_str().unwrap()]);
    assert!(valid.status.success());
    assert!(String::from_utf8_lossy(&valid.stdout).contains("4 actions"));

    let invalid = ctx.run(&["check", fixture("invalid_action.yaml").to_str().unwrap()]);
    assert_eq!(invalid.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&invalid.stderr).contains("'messages' property"));
}

#[test]
fn test_cli_missing_scenario_file() {
    let ctx = CliContext::new();
    let output = ctx.run(&["check", "/nonexistent/scenario.yaml"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read file"));
}
