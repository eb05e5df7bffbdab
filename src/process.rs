//! External command runner.
//!
//! Every collaborator (git, tmux, crontab) is driven through [`run`], which
//! captures stdout/stderr, optionally feeds stdin, and turns a missing binary
//! into [`ManagerError::ExternalToolMissing`] instead of a generic I/O failure.

use crate::error::{ManagerError, Result};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// Captured result of an external command, successful or not.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Standard output, untrimmed.
    pub stdout: String,
    /// Standard error, trimmed.
    pub stderr: String,
    /// Exit code (None if terminated by a signal).
    pub code: Option<i32>,
}

impl CommandOutput {
    fn from_output(output: &Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            code: output.status.code(),
        }
    }

    /// Returns true if the command exited with status 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// The most useful diagnostic text: stderr, or stdout when stderr is empty.
    pub fn diagnostic(&self) -> &str {
        if self.stderr.is_empty() {
            self.stdout.trim()
        } else {
            &self.stderr
        }
    }

    /// Convert a non-zero exit into an [`ManagerError::ExternalCommand`].
    pub fn into_result(self, program: &str, args: &[&str]) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(ManagerError::ExternalCommand(format!(
                "{} {} failed (exit code {}): {}",
                program,
                args.first().unwrap_or(&""),
                self.code.unwrap_or(-1),
                self.diagnostic()
            )))
        }
    }
}

/// Run `program args...`, optionally in `cwd` and with `stdin` piped in.
///
/// A non-zero exit is *not* an error here; callers inspect the output because
/// tmux and crontab signal ordinary conditions ("no server running",
/// "no crontab for user") through exit codes.
pub fn run(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    stdin: Option<&str>,
) -> Result<CommandOutput> {
    debug!(program, ?args, "running external command");

    let mut command = Command::new(program);
    command
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|e| spawn_error(program, e))?;

    if let Some(input) = stdin
        && let Some(mut pipe) = child.stdin.take()
        && let Err(e) = pipe.write_all(input.as_bytes())
    {
        // Close our end and reap the child before reporting.
        drop(pipe);
        let _ = child.kill();
        let _ = child.wait();
        return Err(ManagerError::ExternalCommand(format!(
            "failed to write stdin of {}: {}",
            program, e
        )));
    }

    let output = child.wait_with_output().map_err(|e| {
        ManagerError::ExternalCommand(format!("failed to wait for {}: {}", program, e))
    })?;

    Ok(CommandOutput::from_output(&output))
}

/// Run a command and require a zero exit status.
pub fn run_checked(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    stdin: Option<&str>,
) -> Result<CommandOutput> {
    run(program, args, cwd, stdin)?.into_result(program, args)
}

fn spawn_error(program: &str, e: std::io::Error) -> ManagerError {
    if e.kind() == ErrorKind::NotFound {
        ManagerError::ExternalToolMissing(program.to_string())
    } else {
        ManagerError::ExternalCommand(format!("failed to execute {}: {}", program, e))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_stdout_and_exit_code() {
        let out = run("sh", &["-c", "echo hello; exit 3"], None, None).unwrap();
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(out.code, Some(3));
        assert!(!out.success());
    }

    #[test]
    fn test_feeds_stdin() {
        let out = run("cat", &[], None, Some("line one\nline two\n")).unwrap();
        assert_eq!(out.stdout, "line one\nline two\n");
        assert!(out.success());
    }

    #[test]
    fn test_missing_binary_is_external_tool_missing() {
        let err = run("definitely-not-a-real-binary-xyz", &[], None, None).unwrap_err();
        assert!(matches!(err, ManagerError::ExternalToolMissing(_)));
    }

    #[test]
    fn test_run_checked_reports_stderr() {
        let err = run_checked("sh", &["-c", "echo boom >&2; exit 1"], None, None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("exit code 1"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_child_is_reaped_when_stdin_write_fails() {
        // The child exits without reading, so a large write hits a closed pipe.
        let input = "x".repeat(4 * 1024 * 1024);
        let err = run("true", &[], None, Some(&input)).unwrap_err();
        assert!(matches!(err, ManagerError::ExternalCommand(_)));
        assert!(err.to_string().contains("failed to write stdin of true"));
    }

    #[test]
    fn test_runs_in_requested_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = run_checked("pwd", &[], Some(dir.path()), None).unwrap();
        let reported = std::path::PathBuf::from(out.stdout.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }
}
