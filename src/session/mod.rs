//! Session controller: start, stop, monitor, send and assign.
//!
//! Every operation re-queries the multiplexer for session existence; the
//! controller holds no state of its own beyond its collaborators.
//!
//! ```text
//!   Stopped --start--> Running --stop / out-of-band kill--> Stopped
//! ```

mod follow;
mod mux;
mod tmux;


pub use follow::{Snapshots, new_lines};
pub use mux::{CreateOutcome, Multiplexer};
pub use tmux::Tmux;

use crate::agent::{AgentConfig, compose_system_context, load_skills};
use crate::config::ManagerConfig;
use crate::context::ManagerContext;
use crate::error::{ManagerError, Result};
use crate::launcher::{LauncherRegistry, ProviderProfile};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Scroll-back lines inspected when probing readiness.
const READY_PROBE_LINES: usize = 50;

/// Polling cadence and bounds for session interaction.
#[derive(Debug, Clone)]
pub struct SessionTiming {
    pub poll_interval: Duration,
    /// Wait before the first readiness probe.
    pub startup_wait: Duration,
    /// Give up waiting for a prompt after this long.
    pub ready_timeout: Duration,
    /// Also honor each provider's own startup wait.
    pub provider_startup_waits: bool,
}

impl SessionTiming {
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            startup_wait: Duration::from_millis(config.startup_wait_ms),
            ready_timeout: Duration::from_secs(config.ready_timeout_secs),
            provider_startup_waits: true,
        }
    }
}

/// What `start` did.
#[derive(Debug, Clone, Serialize)]
pub struct StartReport {
    pub agent: String,
    pub session: String,
    pub working_dir: PathBuf,
    pub command: Vec<String>,
    pub provider: String,
    pub skills_loaded: Vec<String>,
    pub skills_missing: Vec<String>,
    /// Whether a system context was sent as the first input.
    pub context_sent: bool,
}

/// What `assign` did.
#[derive(Debug, Clone)]
pub struct AssignReport {
    pub session: String,
    /// Present when the agent had to be started first.
    pub started: Option<StartReport>,
}

/// Drives agent sessions through a [`Multiplexer`].
pub struct SessionController<'a> {
    ctx: &'a ManagerContext,
    mux: &'a dyn Multiplexer,
    launchers: &'a dyn LauncherRegistry,
    timing: SessionTiming,
    /// Readiness waits give up at this instant.
    deadline: Option<Instant>,
}

impl<'a> SessionController<'a> {
    pub fn new(
        ctx: &'a ManagerContext,
        mux: &'a dyn Multiplexer,
        launchers: &'a dyn LauncherRegistry,
        timing: SessionTiming,
    ) -> Self {
        Self {
            ctx,
            mux,
            launchers,
            timing,
            deadline: None,
        }
    }

    /// A controller whose readiness waits end no later than `deadline`.
    pub fn bounded_by(&self, deadline: Instant) -> SessionController<'a> {
        SessionController {
            ctx: self.ctx,
            mux: self.mux,
            launchers: self.launchers,
            timing: self.timing.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn session_name(&self, agent_name: &str) -> String {
        self.ctx.session_name(agent_name)
    }

    pub fn is_running(&self, agent_name: &str) -> Result<bool> {
        self.mux.has_session(&self.session_name(agent_name))
    }

    /// Names of managed sessions (those carrying the session prefix).
    pub fn running_sessions(&self) -> Result<Vec<String>> {
        let prefix = &self.ctx.config.session_prefix;
        Ok(self
            .mux
            .list_sessions()?
            .into_iter()
            .filter(|s| s.starts_with(prefix.as_str()))
            .collect())
    }

    /// Directory the agent's session runs in.
    ///
    /// The override wins, then `working_directory`, then the project root.
    /// Relative paths are anchored at the root. The directory must exist.
    pub fn resolve_working_dir(
        &self,
        agent: &AgentConfig,
        working_dir_override: Option<&Path>,
    ) -> Result<PathBuf> {
        let dir = match (working_dir_override, &agent.working_directory) {
            (Some(dir), _) => self.ctx.resolve_path(&dir.to_string_lossy()),
            (None, Some(template)) => self.ctx.resolve_path(template),
            (None, None) => self.ctx.repo_root.clone(),
        };
        if !dir.is_dir() {
            return Err(ManagerError::Config(format!(
                "working directory '{}' for agent '{}' does not exist",
                dir.display(),
                agent.name
            )));
        }
        Ok(dir)
    }

    /// Start the agent's session and send its system context.
    pub fn start(
        &self,
        agent: &AgentConfig,
        working_dir_override: Option<&Path>,
    ) -> Result<StartReport> {
        if !agent.enabled {
            return Err(ManagerError::Disabled(agent.name.clone()));
        }

        let session = self.session_name(&agent.name);
        if self.mux.has_session(&session)? {
            return Err(already_running(agent, &session));
        }

        let working_dir = self.resolve_working_dir(agent, working_dir_override)?;
        let launcher = self
            .launchers
            .resolve(&self.ctx.expand_template(&agent.launcher))?;
        let args: Vec<String> = agent
            .launcher_args
            .iter()
            .map(|arg| self.ctx.expand_template(arg))
            .collect();
        let command = launcher.command_line(&args);
        let skills = load_skills(self.ctx, &agent.skills);

        if self.mux.create_session(&session, &working_dir, &command)? == CreateOutcome::NameTaken {
            return Err(already_running(agent, &session));
        }
        info!(agent = %agent.name, %session, provider = launcher.provider.name, "session started");

        let context = compose_system_context(agent, &skills.skills);
        let context_sent = !context.is_empty();
        if context_sent {
            if !self.wait_until_ready(&session, launcher.provider)? {
                warn!(
                    %session,
                    "no prompt after {}s; sending system context anyway",
                    self.timing.ready_timeout.as_secs()
                );
            }
            self.mux.paste(&session, &context)?;
            self.mux.send_enter(&session)?;
            debug!(%session, bytes = context.len(), "system context sent");
        }

        Ok(StartReport {
            agent: agent.name.clone(),
            session,
            working_dir,
            command,
            provider: launcher.provider.name.to_string(),
            skills_loaded: skills.skills.into_iter().map(|s| s.name).collect(),
            skills_missing: skills.missing,
            context_sent,
        })
    }

    /// Kill the agent's session.
    pub fn stop(&self, agent_name: &str) -> Result<()> {
        let session = self.session_name(agent_name);
        if !self.mux.has_session(&session)? || !self.mux.kill_session(&session)? {
            return Err(ManagerError::NotRunning(agent_name.to_string()));
        }
        info!(agent = agent_name, %session, "session stopped");
        Ok(())
    }

    /// Trailing scroll-back, or `None` when the agent is stopped.
    pub fn snapshot(&self, agent_name: &str, lines: usize) -> Result<Option<String>> {
        self.mux.capture(&self.session_name(agent_name), lines)
    }

    /// Trailing scroll-back; empty when the agent is stopped.
    pub fn monitor(&self, agent_name: &str, lines: usize) -> Result<String> {
        Ok(self.snapshot(agent_name, lines)?.unwrap_or_default())
    }

    /// Poll the scroll-back until `cancel` is set or the session ends.
    pub fn follow(&self, agent_name: &str, lines: usize, cancel: &'a AtomicBool) -> Snapshots<'a> {
        Snapshots::new(
            self.mux,
            self.session_name(agent_name),
            lines,
            self.timing.poll_interval,
            cancel,
        )
    }

    /// Type text into the session without submitting it.
    ///
    /// Multi-line text goes through a bracketed paste so embedded newlines do
    /// not submit partial input.
    pub fn send(&self, agent_name: &str, text: &str) -> Result<()> {
        let session = self.require_session(agent_name)?;
        if text.contains('\n') {
            self.mux.paste(&session, text)
        } else {
            self.mux.send_literal(&session, text)
        }
    }

    /// Press Enter in the session.
    pub fn submit(&self, agent_name: &str) -> Result<()> {
        let session = self.require_session(agent_name)?;
        self.mux.send_enter(&session)
    }

    /// Hand the agent a task, starting it first when stopped.
    pub fn assign(&self, agent: &AgentConfig, task: &str) -> Result<AssignReport> {
        if task.trim().is_empty() {
            return Err(ManagerError::Validation("task is empty".to_string()));
        }

        let session = self.session_name(&agent.name);
        let started = if self.mux.has_session(&session)? {
            None
        } else {
            match self.start(agent, None) {
                Ok(report) => Some(report),
                // Another starter won the race; the session is there either way.
                Err(ManagerError::AlreadyRunning { .. }) => None,
                Err(e) => return Err(e),
            }
        };

        // Never send into a session we have not seen.
        if !self.mux.has_session(&session)? {
            return Err(ManagerError::NotRunning(agent.name.clone()));
        }
        if let Some(report) = &started
            && !report.context_sent
        {
            self.wait_until_ready(&session, self.provider_for(agent)?)?;
        }

        self.mux.paste(&session, task)?;
        self.mux.send_enter(&session)?;
        info!(agent = %agent.name, %session, bytes = task.len(), "task assigned");

        Ok(AssignReport { session, started })
    }

    /// Screen heuristics for the agent's launcher.
    pub fn provider_for(&self, agent: &AgentConfig) -> Result<&'static ProviderProfile> {
        let launcher = self
            .launchers
            .resolve(&self.ctx.expand_template(&agent.launcher))?;
        Ok(launcher.provider)
    }

    /// Wait for the provider's prompt. Returns false on timeout, or once the
    /// controller's deadline has passed.
    ///
    /// Fails when the session disappears while waiting, which means the
    /// launcher exited.
    pub fn wait_until_ready(&self, session: &str, provider: &ProviderProfile) -> Result<bool> {
        let mut initial = self.timing.startup_wait;
        if self.timing.provider_startup_waits {
            initial = initial.max(Duration::from_millis(provider.startup_wait_ms));
        }
        if let Some(deadline) = self.deadline {
            initial = initial.min(deadline.saturating_duration_since(Instant::now()));
        }
        thread::sleep(initial);

        let started = Instant::now();
        loop {
            let Some(screen) = self.mux.capture(session, READY_PROBE_LINES)? else {
                return Err(ManagerError::ExternalCommand(format!(
                    "session '{}' exited during startup; check the launcher command",
                    session
                )));
            };
            if provider.is_ready(&screen) {
                return Ok(true);
            }
            if started.elapsed() >= self.timing.ready_timeout
                || self.deadline.is_some_and(|d| Instant::now() >= d)
            {
                return Ok(false);
            }
            thread::sleep(self.timing.poll_interval);
        }
    }

    fn require_session(&self, agent_name: &str) -> Result<String> {
        let session = self.session_name(agent_name);
        if !self.mux.has_session(&session)? {
            return Err(ManagerError::NotRunning(agent_name.to_string()));
        }
        Ok(session)
    }
}

fn already_running(agent: &AgentConfig, session: &str) -> ManagerError {
    ManagerError::AlreadyRunning {
        agent: agent.name.clone(),
        session: session.to_string(),
    }
}
