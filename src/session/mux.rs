//! The terminal multiplexer seam.
//!
//! Session state lives entirely in the multiplexer; nothing here caches it.
//! Production code uses [`super::Tmux`], tests a recording fake.

use crate::error::Result;
use std::path::Path;

/// Result of asking the multiplexer for a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// A session with that name already exists. Reported by the create call
    /// itself, so it holds even when two starters race past a pre-check.
    NameTaken,
}

/// Session primitives used by the controller.
pub trait Multiplexer {
    fn has_session(&self, name: &str) -> Result<bool>;

    /// Names of all live sessions.
    fn list_sessions(&self) -> Result<Vec<String>>;

    /// Start a detached session in `working_dir` running `command`.
    fn create_session(
        &self,
        name: &str,
        working_dir: &Path,
        command: &[String],
    ) -> Result<CreateOutcome>;

    /// Trailing `lines` of scroll-back, or `None` when the session is gone.
    fn capture(&self, name: &str, lines: usize) -> Result<Option<String>>;

    /// Type `text` literally without pressing Enter.
    fn send_literal(&self, name: &str, text: &str) -> Result<()>;

    /// Paste `text` as a single bracketed block without pressing Enter.
    fn paste(&self, name: &str, text: &str) -> Result<()>;

    /// Press Enter.
    fn send_enter(&self, name: &str) -> Result<()>;

    /// Kill the session. Returns false when it did not exist.
    fn kill_session(&self, name: &str) -> Result<bool>;
}
