//! Launcher resolution and provider heuristics.
//!
//! An agent's `launcher` is either a path (contains `/` or starts with `.`)
//! or a symbolic provider name such as `claude-code` or `opencode`. The
//! [`LauncherRegistry`] turns it into a program to run plus the
//! [`ProviderProfile`] whose screen patterns tell the session controller when
//! the agent is ready, busy, or blocked on an approval prompt.

use crate::error::{ManagerError, Result};
use std::path::PathBuf;
use tracing::debug;

/// Screen heuristics for one family of interactive CLIs.
#[derive(Debug, PartialEq, Eq)]
pub struct ProviderProfile {
    pub name: &'static str,
    /// Program run for the symbolic name.
    pub command: &'static str,
    /// A line equal to (or a short line starting with) one of these means the
    /// CLI is waiting for input. Empty means "ready after the startup wait".
    pub prompt_patterns: &'static [&'static str],
    /// Accept any line starting with a prompt pattern, not just short ones.
    pub prefix_prompt: bool,
    /// Substrings that mean ready regardless of prompt lines.
    pub ready_markers: &'static [&'static str],
    /// Substrings shown while the agent is working.
    pub busy_patterns: &'static [&'static str],
    /// Substrings shown when the agent waits for a human approval.
    pub blocked_patterns: &'static [&'static str],
    /// Minimum time to give the CLI before probing for readiness.
    pub startup_wait_ms: u64,
}

const COMMON_BLOCKED: &[&str] = &[
    "actions require approval",
    "requires approval",
    "waiting for approval",
];

pub static CLAUDE_CODE: ProviderProfile = ProviderProfile {
    name: "claude-code",
    command: "claude",
    prompt_patterns: &[">", ">\u{a0}", "⟩", "❯"],
    prefix_prompt: false,
    ready_markers: &[],
    busy_patterns: &[
        "✻ Forging",
        "✻ Spelunking",
        "✻ Thinking",
        "Forging…",
        "Spelunking…",
        "Working…",
        "⏳ Thinking",
        "(esc to interrupt",
    ],
    blocked_patterns: COMMON_BLOCKED,
    startup_wait_ms: 0,
};

pub static CLAUDE: ProviderProfile = ProviderProfile {
    name: "claude",
    command: "claude",
    prompt_patterns: &[">", "⟩", ":"],
    prefix_prompt: false,
    ready_markers: &[],
    busy_patterns: &["✻ Thinking", "Thinking...", "⏳ Thinking", "(esc to interrupt"],
    blocked_patterns: &["actions require approval", "requires approval"],
    startup_wait_ms: 1000,
};

pub static CODEX: ProviderProfile = ProviderProfile {
    name: "codex",
    command: "codex",
    prompt_patterns: &["›", "❯"],
    prefix_prompt: true,
    ready_markers: &["shift+tab to cycle modes", "Auto (High)"],
    busy_patterns: &["Thinking...", "Working", "(esc to interrupt"],
    blocked_patterns: COMMON_BLOCKED,
    startup_wait_ms: 1000,
};

pub static DROID: ProviderProfile = ProviderProfile {
    name: "droid",
    command: "droid",
    prompt_patterns: &[">", ">\u{a0}", "⟩"],
    prefix_prompt: true,
    ready_markers: &["? for help", "/ide for VS Code"],
    busy_patterns: &[
        "Thinking...",
        "Thinking…",
        "⏳ Thinking",
        "⠋ Thinking",
        "⠙ Thinking",
        "⠹ Thinking",
        "⠸ Thinking",
        "⠼ Thinking",
        "⠴ Thinking",
        "⠦ Thinking",
        "⠧ Thinking",
        "⠇ Thinking",
        "(esc to interrupt",
    ],
    blocked_patterns: &[
        "all actions require approval",
        "actions require approval",
        "requires approval",
        "waiting for approval",
    ],
    startup_wait_ms: 5000,
};

// Full-screen TUI without a stable prompt line; readiness is the startup wait.
pub static OPENCODE: ProviderProfile = ProviderProfile {
    name: "opencode",
    command: "opencode",
    prompt_patterns: &[],
    prefix_prompt: false,
    ready_markers: &[],
    busy_patterns: &["Thinking...", "Thinking…", "⏳ Thinking", "(esc to interrupt"],
    blocked_patterns: COMMON_BLOCKED,
    startup_wait_ms: 2000,
};

pub static GENERIC: ProviderProfile = ProviderProfile {
    name: "generic",
    command: "",
    prompt_patterns: &[">", "$", "#", ":", "⟩"],
    prefix_prompt: false,
    ready_markers: &[],
    busy_patterns: &[
        "Thinking...",
        "Thinking…",
        "Working…",
        "⏳ Thinking",
        "(esc to interrupt",
    ],
    blocked_patterns: COMMON_BLOCKED,
    startup_wait_ms: 1000,
};

/// Providers addressable by symbolic name.
static NAMED: &[&ProviderProfile] = &[&CLAUDE_CODE, &CLAUDE, &CODEX, &DROID, &OPENCODE];

impl ProviderProfile {
    /// True when the captured screen shows the CLI waiting for input.
    pub fn is_ready(&self, screen: &str) -> bool {
        if self.prompt_patterns.is_empty() {
            return true;
        }
        if self.ready_markers.iter().any(|m| screen.contains(m)) {
            return true;
        }
        screen.lines().map(str::trim).any(|line| {
            self.prompt_patterns.iter().any(|p| {
                line == *p
                    || (line.starts_with(p) && (self.prefix_prompt || line.chars().count() <= 3))
            })
        })
    }

    /// True when the screen shows the agent working.
    pub fn is_busy(&self, screen: &str) -> bool {
        self.busy_patterns.iter().any(|p| screen.contains(p))
    }

    /// True when the screen shows the agent waiting for an approval.
    pub fn is_blocked(&self, screen: &str) -> bool {
        self.blocked_patterns.iter().any(|p| screen.contains(p))
    }
}

/// Infer the provider family from a launcher path or name.
pub fn infer_provider(launcher: &str) -> &'static ProviderProfile {
    let lower = launcher.to_lowercase();
    if lower.contains("droid") {
        &DROID
    } else if lower.contains("opencode") {
        &OPENCODE
    } else if lower.contains("codex") {
        &CODEX
    } else if lower.contains("claude-code") || lower.contains("ccc") {
        &CLAUDE_CODE
    } else if lower.contains("claude") {
        &CLAUDE
    } else {
        &GENERIC
    }
}

/// A launcher ready to be run in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLauncher {
    pub program: String,
    pub provider: &'static ProviderProfile,
}

impl ResolvedLauncher {
    /// Program followed by `args`.
    pub fn command_line(&self, args: &[String]) -> Vec<String> {
        let mut command = Vec::with_capacity(args.len() + 1);
        command.push(self.program.clone());
        command.extend(args.iter().cloned());
        command
    }
}

/// Maps a launcher value to a runnable program.
pub trait LauncherRegistry {
    /// `launcher` has already had its templates expanded.
    fn resolve(&self, launcher: &str) -> Result<ResolvedLauncher>;
}

/// Registry backed by the built-in provider table and `PATH`.
#[derive(Debug, Clone, Default)]
pub struct BuiltinProviders {
    home_dir: Option<PathBuf>,
}

impl BuiltinProviders {
    pub fn new(home_dir: Option<PathBuf>) -> Self {
        Self { home_dir }
    }

    fn named_program(&self, provider: &ProviderProfile) -> Result<String> {
        if provider.name == OPENCODE.name
            && let Some(home) = &self.home_dir
        {
            let candidate = home.join(".opencode").join("bin").join("opencode");
            if candidate.is_file() {
                return Ok(candidate.to_string_lossy().to_string());
            }
        }
        on_path(provider.command)
    }
}

impl LauncherRegistry for BuiltinProviders {
    fn resolve(&self, launcher: &str) -> Result<ResolvedLauncher> {
        let launcher = launcher.trim();
        if launcher.is_empty() {
            return Err(ManagerError::Validation("launcher is empty".to_string()));
        }

        if launcher.contains('/') || launcher.starts_with('.') {
            return Ok(ResolvedLauncher {
                program: launcher.to_string(),
                provider: infer_provider(launcher),
            });
        }

        if let Some(provider) = NAMED
            .iter()
            .copied()
            .find(|p| p.name.eq_ignore_ascii_case(launcher))
        {
            let program = self.named_program(provider)?;
            debug!(launcher, program, "resolved provider launcher");
            return Ok(ResolvedLauncher { program, provider });
        }

        let program = on_path(launcher)?;
        Ok(ResolvedLauncher {
            program,
            provider: infer_provider(launcher),
        })
    }
}

fn on_path(program: &str) -> Result<String> {
    which::which(program)
        .map(|path| path.to_string_lossy().to_string())
        .map_err(|_| ManagerError::ExternalToolMissing(program.to_string()))
}
