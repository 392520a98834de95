// SPDX-License-Identifier: MIT OR Apache-2.0
//! Harness runs against real processes.
#![cfg(unix)]

use std::time::Duration;

use fzg_error::{ErrorCode, HasErrorCode};
use fzg_exec::{ExecError, ExecHarness, ExecSpec, Expectation, Feedback, Harness, InputMode};

fn sh(script: &str) -> ExecSpec {
    ExecSpec::new("sh").with_args(["-c", script])
}

#[tokio::test]
async fn stdin_reaches_the_child() {
    let harness = ExecHarness::new(ExecSpec::new("cat"));
    let outcome = harness.run("hello graph").await.unwrap();
    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(outcome.stdout, "hello graph");
}

#[tokio::test]
async fn file_mode_substitutes_the_path() {
    let spec = ExecSpec::new("cat")
        .with_args(["{}"])
        .with_input(InputMode::File);
    let outcome = ExecHarness::new(spec).run("from a file").await.unwrap();
    assert_eq!(outcome.stdout, "from a file");
}

#[tokio::test]
async fn verdict_follows_the_expectation() {
    let spec = sh("grep -q 2 && echo crash >&2 && exit 3; exit 0").with_expectation(Expectation {
        exit_code: Some(3),
        stdout_contains: None,
        stderr_contains: Some("crash".into()),
    });
    let harness = ExecHarness::new(spec);
    assert_eq!(harness.verdict("12").await.unwrap(), Feedback::Good);
    assert_eq!(harness.verdict("1").await.unwrap(), Feedback::Bad);
}

#[tokio::test]
async fn child_ignoring_stdin_is_fine() {
    let harness = ExecHarness::new(sh("exit 0"));
    let big = "x".repeat(1 << 20);
    assert_eq!(harness.verdict(&big).await.unwrap(), Feedback::Good);
}

#[tokio::test]
async fn env_is_passed() {
    let mut spec = sh("printf %s \"$FZG_MARK\"");
    spec.env.insert("FZG_MARK".into(), "marked".into());
    let outcome = ExecHarness::new(spec).run("").await.unwrap();
    assert_eq!(outcome.stdout, "marked");
}

#[tokio::test]
async fn slow_child_times_out() {
    let spec = sh("sleep 5").with_timeout(Duration::from_millis(100));
    let err = ExecHarness::new(spec).verdict("").await.unwrap_err();
    assert!(matches!(err, ExecError::Timeout { timeout_ms: 100, .. }));
    assert_eq!(err.code(), ErrorCode::HarnessTimeout);
}

#[tokio::test]
async fn missing_program_fails_to_spawn() {
    let harness = ExecHarness::new(ExecSpec::new("fzg-definitely-not-a-program"));
    let err = harness.verdict("").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::HarnessSpawnFailed);
}
