//! Command implementations for agent-manager.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, plus the collaborators every session-touching command
//! shares.

mod agents;
mod doctor;
mod schedule;

use crate::cli::{Command, ScheduleAction, ScheduleCommand};
use crate::context::ManagerContext;
use crate::error::Result;
use crate::launcher::BuiltinProviders;
use crate::session::{SessionController, SessionTiming, Tmux};

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::List(args) => agents::cmd_list(args),
        Command::Start(args) => agents::cmd_start(args),
        Command::Stop(args) => agents::cmd_stop(args),
        Command::Monitor(args) => agents::cmd_monitor(args),
        Command::Send(args) => agents::cmd_send(args),
        Command::Assign(args) => agents::cmd_assign(args),
        Command::Schedule(schedule_cmd) => dispatch_schedule(schedule_cmd),
        Command::Doctor(args) => doctor::cmd_doctor(args),
    }
}

/// Dispatch schedule subcommands.
fn dispatch_schedule(schedule_cmd: ScheduleCommand) -> Result<()> {
    match schedule_cmd.action {
        ScheduleAction::List(args) => schedule::cmd_schedule_list(args),
        ScheduleAction::Sync(args) => schedule::cmd_schedule_sync(args),
        ScheduleAction::Run(args) => schedule::cmd_schedule_run(args),
    }
}

/// Resolved project plus the real tmux and launcher collaborators.
struct Runtime {
    ctx: ManagerContext,
    tmux: Tmux,
    launchers: BuiltinProviders,
}

impl Runtime {
    fn resolve() -> Result<Self> {
        let ctx = ManagerContext::resolve()?;
        let launchers = BuiltinProviders::new(ctx.home_dir.clone());
        Ok(Self {
            ctx,
            tmux: Tmux::new(),
            launchers,
        })
    }

    fn sessions(&self) -> SessionController<'_> {
        SessionController::new(
            &self.ctx,
            &self.tmux,
            &self.launchers,
            SessionTiming::from_config(&self.ctx.config),
        )
    }
}
