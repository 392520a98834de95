// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! fzg-exec
//!
//! Runs a system under test on generated text and turns the result into a
//! [`Feedback`] verdict. The text goes to the child's stdin or into a temp
//! file whose path replaces `{}` in the arguments. An [`Expectation`] then
//! decides whether the run counts as [`Feedback::Good`].

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fzg_error::{ErrorCode, HasErrorCode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

pub use fzg_reduce::Feedback;

/// Argument placeholder replaced by the input file path in [`InputMode::File`].
pub const PATH_PLACEHOLDER: &str = "{}";

// ---------------------------------------------------------------------------
// Spec
// ---------------------------------------------------------------------------

/// How the generated text reaches the child process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Write the text to stdin and close it.
    #[default]
    Stdin,
    /// Write the text to a temp file and pass its path. Every `{}` argument is
    /// replaced by the path; without one the path is appended.
    File,
}

/// Criteria for a [`Feedback::Good`] verdict. Every criterion that is set
/// must hold. With nothing set, a run is good when it exits successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Expectation {
    /// Required exit code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Substring that stdout must contain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_contains: Option<String>,
    /// Substring that stderr must contain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_contains: Option<String>,
}

impl Expectation {
    /// `true` when no criterion is set.
    pub fn is_empty(&self) -> bool {
        self.exit_code.is_none() && self.stdout_contains.is_none() && self.stderr_contains.is_none()
    }

    /// Evaluate the criteria against a finished run.
    pub fn evaluate(&self, outcome: &ExecOutcome) -> Feedback {
        if self.is_empty() {
            return if outcome.exit_code == Some(0) {
                Feedback::Good
            } else {
                Feedback::Bad
            };
        }
        let exit_ok = self.exit_code.is_none_or(|code| outcome.exit_code == Some(code));
        let stdout_ok = self
            .stdout_contains
            .as_deref()
            .is_none_or(|needle| outcome.stdout.contains(needle));
        let stderr_ok = self
            .stderr_contains
            .as_deref()
            .is_none_or(|needle| outcome.stderr.contains(needle));
        if exit_ok && stdout_ok && stderr_ok {
            Feedback::Good
        } else {
            Feedback::Bad
        }
    }
}

/// Everything needed to run the system under test once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExecSpec {
    /// Program to spawn.
    pub command: String,
    /// Arguments; see [`InputMode::File`] for `{}` substitution.
    #[serde(default)]
    pub args: Vec<String>,
    /// How the text is delivered.
    #[serde(default)]
    pub input: InputMode,
    /// Working directory for the child.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Extra environment variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Per-run wall clock limit in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Verdict criteria.
    #[serde(default)]
    pub expect: Expectation,
}

impl ExecSpec {
    /// A spec that runs `command` with stdin input and no criteria.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            input: InputMode::Stdin,
            cwd: None,
            env: BTreeMap::new(),
            timeout_ms: None,
            expect: Expectation::default(),
        }
    }

    /// Builder: set the arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set the input mode.
    pub fn with_input(mut self, input: InputMode) -> Self {
        self.input = input;
        self
    }

    /// Builder: set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    /// Builder: set the verdict criteria.
    pub fn with_expectation(mut self, expect: Expectation) -> Self {
        self.expect = expect;
        self
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Result of one finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Exit code, `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout (lossy UTF-8).
    pub stdout: String,
    /// Captured stderr (lossy UTF-8).
    pub stderr: String,
    /// Wall clock time of the run.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from running the system under test. All of them end the run.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The process could not be started.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// Program that failed to start.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The process ran past its limit and was killed.
    #[error("'{command}' timed out after {timeout_ms}ms")]
    Timeout {
        /// Program that timed out.
        command: String,
        /// Configured limit.
        timeout_ms: u64,
    },

    /// Feeding input or collecting output failed.
    #[error("harness I/O failed: {0}")]
    Io(#[source] std::io::Error),
}

impl HasErrorCode for ExecError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::Spawn { .. } => ErrorCode::HarnessSpawnFailed,
            Self::Timeout { .. } => ErrorCode::HarnessTimeout,
            Self::Io(_) => ErrorCode::HarnessIo,
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Anything that can judge a generated text.
#[async_trait]
pub trait Harness: Send + Sync {
    /// Decide whether `text` still shows the behaviour of interest.
    async fn verdict(&self, text: &str) -> Result<Feedback, ExecError>;
}

/// A harness backed by a synchronous closure. Useful for tests and for
/// embedding an in-process oracle.
pub struct ClosureHarness<F> {
    judge: F,
}

impl<F> ClosureHarness<F>
where
    F: Fn(&str) -> Feedback + Send + Sync,
{
    /// Wrap `judge`.
    pub fn new(judge: F) -> Self {
        Self { judge }
    }
}

impl<F> std::fmt::Debug for ClosureHarness<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureHarness").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Harness for ClosureHarness<F>
where
    F: Fn(&str) -> Feedback + Send + Sync,
{
    async fn verdict(&self, text: &str) -> Result<Feedback, ExecError> {
        Ok((self.judge)(text))
    }
}

/// Runs an external program per verdict.
#[derive(Debug, Clone)]
pub struct ExecHarness {
    spec: ExecSpec,
}

impl ExecHarness {
    /// Create a harness for `spec`.
    pub fn new(spec: ExecSpec) -> Self {
        Self { spec }
    }

    /// The spec this harness runs.
    pub fn spec(&self) -> &ExecSpec {
        &self.spec
    }

    /// Run the program once on `text` and capture its output.
    pub async fn run(&self, text: &str) -> Result<ExecOutcome, ExecError> {
        let spec = &self.spec;

        // Held until the child exits so the path stays valid.
        let input_file = match spec.input {
            InputMode::File => Some(write_input_file(text)?),
            InputMode::Stdin => None,
        };
        let args = match &input_file {
            Some(file) => substitute_path(&spec.args, file.path()),
            None => spec.args.clone(),
        };

        let mut cmd = Command::new(&spec.command);
        cmd.args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        match spec.input {
            InputMode::Stdin => cmd.stdin(Stdio::piped()),
            InputMode::File => cmd.stdin(Stdio::null()),
        };
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            command: spec.command.clone(),
            source,
        })?;
        let stdin = child.stdin.take();

        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(text.as_bytes()).await {
                // The child may exit without reading its input.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };
        let run = async { tokio::join!(feed, child.wait_with_output()) };

        let (fed, output) = match spec.timeout() {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(done) => done,
                Err(_) => {
                    warn!(target: "fzg.exec", command = %spec.command, timeout_ms = limit.as_millis() as u64, "harness run timed out");
                    return Err(ExecError::Timeout {
                        command: spec.command.clone(),
                        timeout_ms: limit.as_millis() as u64,
                    });
                }
            },
            None => run.await,
        };
        fed.map_err(ExecError::Io)?;
        let output = output.map_err(ExecError::Io)?;
        drop(input_file);

        let outcome = ExecOutcome {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed: started.elapsed(),
        };
        debug!(
            target: "fzg.exec",
            command = %spec.command,
            exit_code = ?outcome.exit_code,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            input_len = text.len(),
            "harness run finished"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl Harness for ExecHarness {
    async fn verdict(&self, text: &str) -> Result<Feedback, ExecError> {
        let outcome = self.run(text).await?;
        let verdict = self.spec.expect.evaluate(&outcome);
        debug!(target: "fzg.exec", ?verdict, "verdict");
        Ok(verdict)
    }
}

fn write_input_file(text: &str) -> Result<tempfile::NamedTempFile, ExecError> {
    let mut file = tempfile::NamedTempFile::new().map_err(ExecError::Io)?;
    file.write_all(text.as_bytes()).map_err(ExecError::Io)?;
    file.flush().map_err(ExecError::Io)?;
    Ok(file)
}

fn substitute_path(args: &[String], path: &Path) -> Vec<String> {
    let path = path.display().to_string();
    if !args.iter().any(|a| a.contains(PATH_PLACEHOLDER)) {
        let mut args = args.to_vec();
        args.push(path);
        return args;
    }
    args.iter()
        .map(|a| a.replace(PATH_PLACEHOLDER, &path))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
