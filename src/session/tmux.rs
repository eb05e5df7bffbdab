//! tmux-backed [`Multiplexer`].

use super::mux::{CreateOutcome, Multiplexer};
use crate::error::{ManagerError, Result};
use crate::process::{self, CommandOutput};
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::debug;

const TMUX: &str = "tmux";

/// Characters per `send-keys -l` call; long single calls drop keys under load.
const SEND_CHUNK_CHARS: usize = 100;

/// Substrings of tmux stderr meaning "there is no such session".
const NO_SESSION: &[&str] = &[
    "can't find session",
    "no server running",
    "no sessions",
    "error connecting to",
    "session not found",
];

/// Drives the `tmux` binary.
#[derive(Debug, Clone)]
pub struct Tmux {
    /// Pause after a paste so the client finishes reading before Enter.
    paste_settle: Duration,
    /// Pause between literal chunks.
    chunk_pause: Duration,
}

impl Default for Tmux {
    fn default() -> Self {
        Self {
            paste_settle: Duration::from_millis(500),
            chunk_pause: Duration::from_millis(50),
        }
    }
}

impl Tmux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that tmux is installed; returns its version string.
    pub fn version(&self) -> Result<String> {
        let out = process::run_checked(TMUX, &["-V"], None, None)?;
        Ok(out.stdout.trim().to_string())
    }

    fn tmux(&self, args: &[&str]) -> Result<CommandOutput> {
        process::run(TMUX, args, None, None)
    }

    fn tmux_checked(&self, args: &[&str]) -> Result<CommandOutput> {
        process::run_checked(TMUX, args, None, None)
    }

    fn buffer_name(&self) -> String {
        format!("agent-manager-{}", std::process::id())
    }
}

// `=name` forces an exact match; plain names also match by prefix.
fn session_target(name: &str) -> String {
    format!("={}", name)
}

fn pane_target(name: &str) -> String {
    format!("={}:", name)
}

fn is_missing_session(output: &CommandOutput) -> bool {
    NO_SESSION.iter().any(|s| output.stderr.contains(s))
}

fn command_error(out: &CommandOutput, subcommand: &str) -> ManagerError {
    ManagerError::ExternalCommand(format!(
        "tmux {} failed (exit code {}): {}",
        subcommand,
        out.code.unwrap_or(-1),
        out.diagnostic()
    ))
}

impl Multiplexer for Tmux {
    fn has_session(&self, name: &str) -> Result<bool> {
        let out = self.tmux(&["has-session", "-t", &session_target(name)])?;
        Ok(out.success())
    }

    fn list_sessions(&self) -> Result<Vec<String>> {
        let out = self.tmux(&["list-sessions", "-F", "#{session_name}"])?;
        if !out.success() {
            if is_missing_session(&out) {
                return Ok(Vec::new());
            }
            return Err(command_error(&out, "list-sessions"));
        }
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn create_session(
        &self,
        name: &str,
        working_dir: &Path,
        command: &[String],
    ) -> Result<CreateOutcome> {
        let dir = working_dir.to_string_lossy();
        let shell_command = shell_words::join(command);
        let out = self.tmux(&["new-session", "-d", "-s", name, "-c", &dir, &shell_command])?;
        if out.success() {
            return Ok(CreateOutcome::Created);
        }
        if out.stderr.contains("duplicate session") {
            debug!(session = name, "tmux reported duplicate session");
            return Ok(CreateOutcome::NameTaken);
        }
        Err(command_error(&out, "new-session"))
    }

    fn capture(&self, name: &str, lines: usize) -> Result<Option<String>> {
        let start = format!("-{}", lines);
        let target = pane_target(name);
        let out = self.tmux(&["capture-pane", "-p", "-J", "-t", &target, "-S", &start])?;
        if !out.success() {
            if is_missing_session(&out) {
                return Ok(None);
            }
            return Err(command_error(&out, "capture-pane"));
        }
        Ok(Some(tail_lines(&out.stdout, lines)))
    }

    fn send_literal(&self, name: &str, text: &str) -> Result<()> {
        let target = pane_target(name);
        let chars: Vec<char> = text.chars().collect();
        for (i, chunk) in chars.chunks(SEND_CHUNK_CHARS).enumerate() {
            if i > 0 {
                thread::sleep(self.chunk_pause);
            }
            let chunk: String = chunk.iter().collect();
            self.tmux_checked(&["send-keys", "-t", &target, "-l", "--", &chunk])?;
        }
        Ok(())
    }

    fn paste(&self, name: &str, text: &str) -> Result<()> {
        let buffer = self.buffer_name();
        process::run_checked(TMUX, &["load-buffer", "-b", &buffer, "-"], None, Some(text))?;
        // -p: bracketed paste so the client treats newlines as text, -d: drop the buffer.
        let target = pane_target(name);
        self.tmux_checked(&["paste-buffer", "-p", "-d", "-b", &buffer, "-t", &target])?;
        thread::sleep(self.paste_settle);
        Ok(())
    }

    fn send_enter(&self, name: &str) -> Result<()> {
        self.tmux_checked(&["send-keys", "-t", &pane_target(name), "Enter"])?;
        Ok(())
    }

    fn kill_session(&self, name: &str) -> Result<bool> {
        let out = self.tmux(&["kill-session", "-t", &session_target(name)])?;
        if out.success() {
            return Ok(true);
        }
        if is_missing_session(&out) {
            return Ok(false);
        }
        Err(command_error(&out, "kill-session"))
    }
}

/// Last `lines` lines of a capture, ignoring the blank rows tmux pads with.
fn tail_lines(captured: &str, lines: usize) -> String {
    let all: Vec<&str> = captured.trim_end().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_lines_drops_padding() {
        let captured = "one\ntwo\nthree\n\n\n\n";
        assert_eq!(tail_lines(captured, 2), "two\nthree");
        assert_eq!(tail_lines(captured, 10), "one\ntwo\nthree");
        assert_eq!(tail_lines("", 5), "");
    }

    #[test]
    fn test_targets_are_exact() {
        assert_eq!(session_target("agent-alpha"), "=agent-alpha");
        assert_eq!(pane_target("agent-alpha"), "=agent-alpha:");
    }

    #[test]
    fn test_missing_session_detection() {
        let out = CommandOutput {
            stdout: String::new(),
            stderr: "can't find session: =agent-x".to_string(),
            code: Some(1),
        };
        assert!(is_missing_session(&out));

        let out = CommandOutput {
            stdout: String::new(),
            stderr: "no server running on /tmp/tmux-0/default".to_string(),
            code: Some(1),
        };
        assert!(is_missing_session(&out));
    }
}
