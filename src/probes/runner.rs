//! Bounded external command execution.
//!
//! Every external tool devmon touches goes through this module: a fixed argv
//! (no shell interpolation), a hard timeout, and validators for any argument
//! that originated in another tool's output. The single exception is
//! [`run_shell`], reserved for commands the user explicitly confirmed.

#![allow(dead_code)]

use std::process::Output;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;

/// Default timeout applied to probe commands.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Failure modes of an external command.
#[derive(Debug)]
pub enum RunnerError {
    /// The command did not finish within the deadline.
    Timeout { name: String, timeout: Duration },
    /// The command could not be spawned (missing binary, permissions).
    Spawn { name: String, source: std::io::Error },
    /// The command ran but exited non-zero; captured output attached.
    NonZero { name: String, output: String },
}

impl std::fmt::Display for RunnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { name, timeout } => {
                write!(f, "{} timed out after {:?}", name, timeout)
            }
            Self::Spawn { name, source } => write!(f, "failed to spawn {}: {}", name, source),
            Self::NonZero { name, output } => {
                write!(f, "{} exited non-zero: {}", name, output.trim())
            }
        }
    }
}

impl std::error::Error for RunnerError {}

impl RunnerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

async fn run_inner(
    name: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<Output, RunnerError> {
    let mut cmd = Command::new(name);
    cmd.args(args).kill_on_drop(true);

    let fut = cmd.output();
    match tokio::time::timeout(timeout, fut).await {
        Err(_) => Err(RunnerError::Timeout {
            name: name.to_string(),
            timeout,
        }),
        Ok(Err(source)) => Err(RunnerError::Spawn {
            name: name.to_string(),
            source,
        }),
        Ok(Ok(output)) => Ok(output),
    }
}

/// Run a command and return its stdout. Non-zero exit is an error.
pub async fn run(name: &str, args: &[&str]) -> Result<Vec<u8>, RunnerError> {
    run_with_timeout(name, args, DEFAULT_TIMEOUT).await
}

/// Run a command with an explicit deadline.
pub async fn run_with_timeout(
    name: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<Vec<u8>, RunnerError> {
    let output = run_inner(name, args, timeout).await?;
    if !output.status.success() {
        return Err(RunnerError::NonZero {
            name: name.to_string(),
            output: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(output.stdout)
}

/// Run a command and return stdout+stderr interleaved as one buffer,
/// regardless of exit status. Callers that care about success inspect the
/// returned flag.
pub async fn run_combined(
    name: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<(bool, String), RunnerError> {
    let output = run_inner(name, args, timeout).await?;
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok((output.status.success(), text))
}

/// Check whether a command exits zero. Used for liveness probes (`pgrep`).
pub async fn succeeds(name: &str, args: &[&str]) -> bool {
    matches!(run_inner(name, args, DEFAULT_TIMEOUT).await, Ok(o) if o.status.success())
}

/// Execute a user-confirmed command line through `sh -c`.
///
/// This is the only shell path in the program. It must never be reached with
/// anything other than a command the user accepted in the pending-command
/// prompt or the confirmation dialog.
pub async fn run_shell(command: &str, timeout: Duration) -> Result<(bool, String), RunnerError> {
    run_combined("sh", &["-c", command], timeout).await
}

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| Regex::new("^[A-Za-z0-9_-]+$").unwrap());
static PID_RE: Lazy<Regex> = Lazy::new(|| Regex::new("^[0-9]+$").unwrap());
static CONTAINER_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new("^[a-f0-9]+$").unwrap());

/// Database names, process names and similar identifiers: alphanumerics,
/// underscore and hyphen only.
pub fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty() && IDENTIFIER_RE.is_match(s)
}

/// Process ids: digits only.
pub fn is_valid_pid(s: &str) -> bool {
    !s.is_empty() && PID_RE.is_match(s)
}

/// Container ids: lowercase hex, short or full form.
pub fn is_valid_container_id(s: &str) -> bool {
    !s.is_empty() && CONTAINER_ID_RE.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_validation() {
        assert!(is_valid_identifier("app_main-db2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("db;drop table"));
        assert!(!is_valid_identifier("name with space"));
        assert!(!is_valid_identifier("café"));
    }

    #[test]
    fn pid_validation() {
        assert!(is_valid_pid("12345"));
        assert!(!is_valid_pid(""));
        assert!(!is_valid_pid("12a45"));
        assert!(!is_valid_pid("-1"));
    }

    #[test]
    fn container_id_validation() {
        assert!(is_valid_container_id("3fa9c1"));
        assert!(is_valid_container_id(
            "4e9d2c8b1a0f4e9d2c8b1a0f4e9d2c8b1a0f4e9d2c8b1a0f4e9d2c8b1a0f4e9d"
        ));
        assert!(!is_valid_container_id("3FA9C1"));
        assert!(!is_valid_container_id("mock_id"));
        assert!(!is_valid_container_id(""));
    }

    #[tokio::test]
    async fn captures_stdout() {
        let out = run("echo", &["hello"]).await.expect("echo should run");
        assert_eq!(String::from_utf8_lossy(&out).trim(), "hello");
    }

    #[tokio::test]
    async fn reports_non_zero_exit() {
        let err = run("sh", &["-c", "echo oops >&2; exit 3"])
            .await
            .expect_err("non-zero exit should be an error");
        match err {
            RunnerError::NonZero { output, .. } => assert!(output.contains("oops")),
            other => panic!("unexpected error kind: {other}"),
        }
    }

    #[tokio::test]
    async fn enforces_timeout() {
        let err = run_with_timeout("sleep", &["5"], Duration::from_millis(100))
            .await
            .expect_err("sleep should hit the deadline");
        assert!(err.is_timeout(), "expected timeout, got {err}");
    }

    #[tokio::test]
    async fn combined_keeps_output_on_failure() {
        let (ok, text) = run_combined("sh", &["-c", "echo out; echo err >&2; exit 1"], DEFAULT_TIMEOUT)
            .await
            .expect("command should spawn");
        assert!(!ok);
        assert!(text.contains("out") && text.contains("err"));
    }
}
