//! External command execution.
//!
//! Every package manager is driven through its command-line tool. Commands
//! run on the tokio runtime and are bounded by a timeout so a hung tool only
//! fails its own provider.

use std::io;
use std::process::Stdio;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("`{command}` not found in PATH")]
    Missing { command: String },

    #[error("`{command}` failed with status {status}: {stderr}")]
    Failed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {}s", timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },

    #[error("failed to run `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// Runs `program args...` and returns its stdout when it exits successfully.
pub async fn run(program: &str, args: &[&str], timeout: Duration) -> Result<Vec<u8>, CommandError> {
    let command = display_command(program, args);
    debug!(%command, "running");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, child).await {
        Ok(result) => result.map_err(|err| map_spawn_error(err, &command))?,
        Err(_) => return Err(CommandError::TimedOut { command, timeout }),
    };

    if !output.status.success() {
        return Err(CommandError::Failed {
            command,
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output.stdout)
}

/// Runs a version command and returns its banner, or `None` if the tool is
/// missing or fails.
pub async fn banner(program: &str, args: &[&str], timeout: Duration) -> Option<String> {
    match run(program, args, timeout).await {
        Ok(stdout) => Some(String::from_utf8_lossy(&stdout).into_owned()),
        Err(err) => {
            debug!(error = %err, "probe failed");
            None
        }
    }
}

/// Returns true when `program args...` succeeds and its banner matches `pattern`.
pub async fn probe(program: &str, args: &[&str], pattern: &Regex, timeout: Duration) -> bool {
    banner(program, args, timeout)
        .await
        .is_some_and(|out| pattern.is_match(&out))
}

fn display_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

fn map_spawn_error(err: io::Error, command: &str) -> CommandError {
    if err.kind() == io::ErrorKind::NotFound {
        CommandError::Missing {
            command: command.to_string(),
        }
    } else {
        CommandError::Io {
            command: command.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_missing_binary() {
        let err = run("compulsive-no-such-binary", &["--version"], TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Missing { .. }));
    }

    #[tokio::test]
    async fn test_probe_missing_binary_is_unavailable() {
        let re = Regex::new(".*").unwrap();
        assert!(!probe("compulsive-no-such-binary", &[], &re, TIMEOUT).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_stdout() {
        let out = run("sh", &["-c", "echo hello"], TIMEOUT).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&out).trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reports_failure() {
        let err = run("sh", &["-c", "echo oops >&2; exit 3"], TIMEOUT)
            .await
            .unwrap_err();
        match err {
            CommandError::Failed { status, stderr, .. } => {
                assert_eq!(status, 3);
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out() {
        let err = run("sh", &["-c", "sleep 5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::TimedOut { .. }));
    }

    #[test]
    fn test_display_command() {
        assert_eq!(display_command("brew", &["info", "--json=v2"]), "brew info --json=v2");
    }
}
