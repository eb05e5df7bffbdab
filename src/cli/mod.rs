//! CLI argument parsing for agent-manager.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use crate::agent::parse_duration;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// agent-manager: run coding agents in tmux sessions and schedule them with cron.
///
/// Agents are markdown documents with YAML frontmatter under the agents
/// directory. Each running agent owns one tmux session; scheduled jobs live
/// in a managed block of the user's crontab.
#[derive(Parser, Debug)]
#[command(name = "agent-manager")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log debug output to stderr (overrides AGENT_MANAGER_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for agent-manager.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List configured agents and whether each is running.
    List(ListArgs),

    /// Start an agent in a new tmux session.
    ///
    /// Sends the agent's prompt and skills as the first input once the
    /// launcher shows its prompt.
    Start(StartArgs),

    /// Stop an agent by killing its session.
    Stop(AgentArg),

    /// Print the recent output of an agent's session.
    Monitor(MonitorArgs),

    /// Type text into a running agent's session.
    Send(SendArgs),

    /// Give an agent a task, starting it first if needed.
    ///
    /// The task is read from --task-file, or from stdin when omitted.
    Assign(AssignArgs),

    /// Scheduled job commands.
    Schedule(ScheduleCommand),

    /// Check the environment and agent documents for problems.
    Doctor(DoctorArgs),
}

/// A single agent name.
#[derive(Parser, Debug)]
pub struct AgentArg {
    /// Agent name as declared in its document.
    pub name: String,
}

/// Arguments for the `list` command.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Only show agents with a live session.
    #[arg(long)]
    pub running: bool,

    /// Print machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `start` command.
#[derive(Parser, Debug)]
pub struct StartArgs {
    /// Agent name as declared in its document.
    pub name: String,

    /// Run the session in this directory instead of the configured one.
    #[arg(long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,
}

/// Arguments for the `monitor` command.
#[derive(Parser, Debug)]
pub struct MonitorArgs {
    /// Agent name as declared in its document.
    pub name: String,

    /// Number of trailing lines to show.
    #[arg(short = 'n', long, default_value_t = 100)]
    pub lines: usize,

    /// Keep printing new output until interrupted or the session ends.
    #[arg(short, long)]
    pub follow: bool,
}

/// Arguments for the `send` command.
#[derive(Parser, Debug)]
pub struct SendArgs {
    /// Agent name as declared in its document.
    pub name: String,

    /// Text to type.
    pub text: String,

    /// Press Enter after the text.
    #[arg(long)]
    pub submit: bool,
}

/// Arguments for the `assign` command.
#[derive(Parser, Debug)]
pub struct AssignArgs {
    /// Agent name as declared in its document.
    pub name: String,

    /// Read the task from this file instead of stdin.
    #[arg(long, value_name = "FILE")]
    pub task_file: Option<PathBuf>,
}

/// Schedule subcommands.
#[derive(Parser, Debug)]
pub struct ScheduleCommand {
    #[command(subcommand)]
    pub action: ScheduleAction,
}

/// Available schedule actions.
#[derive(Subcommand, Debug)]
pub enum ScheduleAction {
    /// List every schedule entry of every agent.
    List(ScheduleListArgs),

    /// Write enabled schedules into the managed crontab block.
    Sync(ScheduleSyncArgs),

    /// Run one scheduled job now (this is what cron invokes).
    Run(ScheduleRunArgs),
}

/// Arguments for `schedule list`.
#[derive(Parser, Debug)]
pub struct ScheduleListArgs {
    /// Print machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `schedule sync`.
#[derive(Parser, Debug)]
pub struct ScheduleSyncArgs {
    /// Show the diff without writing the crontab.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for `schedule run`.
#[derive(Parser, Debug)]
pub struct ScheduleRunArgs {
    /// Agent name as declared in its document.
    pub name: String,

    /// Schedule entry name.
    #[arg(long)]
    pub job: String,

    /// Hard runtime cap, e.g. `30m` (overrides the entry's max_runtime).
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout)]
    pub timeout: Option<Duration>,
}

/// Arguments for the `doctor` command.
#[derive(Parser, Debug)]
pub struct DoctorArgs {
    /// Also resolve each agent's working directory, launcher and skills.
    #[arg(long)]
    pub deep: bool,
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    parse_duration(value).map_err(|e| e.to_string())
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        // Verifies the CLI arguments configuration is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_list_flags() {
        let cli = Cli::try_parse_from(["agent-manager", "list", "--running", "--json"]).unwrap();
        if let Command::List(args) = cli.command {
            assert!(args.running);
            assert!(args.json);
        } else {
            panic!("Expected List command");
        }
    }

    #[test]
    fn parse_start_with_working_dir() {
        let cli = Cli::try_parse_from([
            "agent-manager",
            "start",
            "alpha",
            "--working-dir",
            "/tmp/work",
        ])
        .unwrap();
        if let Command::Start(args) = cli.command {
            assert_eq!(args.name, "alpha");
            assert_eq!(args.working_dir, Some(PathBuf::from("/tmp/work")));
        } else {
            panic!("Expected Start command");
        }
    }

    #[test]
    fn parse_monitor_defaults() {
        let cli = Cli::try_parse_from(["agent-manager", "monitor", "alpha"]).unwrap();
        if let Command::Monitor(args) = cli.command {
            assert_eq!(args.lines, 100);
            assert!(!args.follow);
        } else {
            panic!("Expected Monitor command");
        }

        let cli =
            Cli::try_parse_from(["agent-manager", "monitor", "alpha", "-n", "20", "--follow"])
                .unwrap();
        if let Command::Monitor(args) = cli.command {
            assert_eq!(args.lines, 20);
            assert!(args.follow);
        } else {
            panic!("Expected Monitor command");
        }
    }

    #[test]
    fn parse_send_submit() {
        let cli =
            Cli::try_parse_from(["agent-manager", "send", "alpha", "hello there", "--submit"])
                .unwrap();
        if let Command::Send(args) = cli.command {
            assert_eq!(args.text, "hello there");
            assert!(args.submit);
        } else {
            panic!("Expected Send command");
        }
    }

    #[test]
    fn parse_assign_without_file_reads_stdin() {
        let cli = Cli::try_parse_from(["agent-manager", "assign", "alpha"]).unwrap();
        if let Command::Assign(args) = cli.command {
            assert!(args.task_file.is_none());
        } else {
            panic!("Expected Assign command");
        }
    }

    #[test]
    fn parse_schedule_run_with_timeout() {
        let cli = Cli::try_parse_from([
            "agent-manager",
            "schedule",
            "run",
            "alpha",
            "--job",
            "daily",
            "--timeout",
            "30m",
        ])
        .unwrap();
        if let Command::Schedule(ScheduleCommand {
            action: ScheduleAction::Run(args),
        }) = cli.command
        {
            assert_eq!(args.name, "alpha");
            assert_eq!(args.job, "daily");
            assert_eq!(args.timeout, Some(Duration::from_secs(1800)));
        } else {
            panic!("Expected schedule run command");
        }
    }

    #[test]
    fn schedule_run_requires_job_and_valid_timeout() {
        assert!(Cli::try_parse_from(["agent-manager", "schedule", "run", "alpha"]).is_err());
        assert!(
            Cli::try_parse_from([
                "agent-manager",
                "schedule",
                "run",
                "alpha",
                "--job",
                "daily",
                "--timeout",
                "soon",
            ])
            .is_err()
        );
    }

    #[test]
    fn parse_schedule_sync_dry_run_and_global_verbose() {
        let cli =
            Cli::try_parse_from(["agent-manager", "schedule", "sync", "--dry-run", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Command::Schedule(ScheduleCommand {
                action: ScheduleAction::Sync(ScheduleSyncArgs { dry_run: true })
            })
        ));
    }

    #[test]
    fn parse_doctor_deep() {
        let cli = Cli::try_parse_from(["agent-manager", "doctor", "--deep"]).unwrap();
        assert!(matches!(cli.command, Command::Doctor(DoctorArgs { deep: true })));
    }
}
