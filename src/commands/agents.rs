//! Agent lifecycle commands: list, start, stop, monitor, send, assign.

use super::Runtime;
use crate::agent::{AgentConfig, list_agents, load_agent};
use crate::cli::{AgentArg, AssignArgs, ListArgs, MonitorArgs, SendArgs, StartArgs};
use crate::context::ManagerContext;
use crate::error::{ManagerError, Result};
use crate::session::{SessionController, StartReport, new_lines};
use crate::signal;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// One row of `list`.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub running: bool,
    pub session: String,
    pub launcher: String,
    pub schedules: usize,
    pub source: PathBuf,
}

// ============================================================================
// list
// ============================================================================

pub fn cmd_list(args: ListArgs) -> Result<()> {
    let rt = Runtime::resolve()?;
    let sessions = rt.sessions();
    let statuses = agent_statuses(&rt.ctx, &sessions, args.running)?;

    if args.json {
        let json = serde_json::to_string_pretty(&statuses).map_err(|e| {
            ManagerError::Config(format!("failed to serialize agent list: {}", e))
        })?;
        println!("{}", json);
        return Ok(());
    }

    if statuses.is_empty() {
        if args.running {
            println!("No agents are running.");
        } else {
            println!("No agents found in {}", rt.ctx.agents_dir.display());
        }
        return Ok(());
    }
    print!("{}", format_status_table(&statuses));
    Ok(())
}

/// Every loadable agent with its session state, by name.
///
/// Documents that fail to load are reported on stderr and left out.
pub fn agent_statuses(
    ctx: &ManagerContext,
    sessions: &SessionController<'_>,
    running_only: bool,
) -> Result<Vec<AgentStatus>> {
    let listing = list_agents(ctx)?;
    for invalid in &listing.invalid {
        eprintln!(
            "Warning: skipping {}: {}",
            invalid.path.display(),
            invalid.reason
        );
    }

    let live: HashSet<String> = sessions.running_sessions()?.into_iter().collect();
    let statuses = listing
        .agents
        .into_iter()
        .map(|agent| {
            let session = sessions.session_name(&agent.name);
            AgentStatus {
                running: live.contains(&session),
                session,
                name: agent.name,
                description: agent.description,
                enabled: agent.enabled,
                launcher: agent.launcher,
                schedules: agent.schedules.len(),
                source: agent.source,
            }
        })
        .filter(|status| !running_only || status.running)
        .collect();
    Ok(statuses)
}

/// Fixed-width table of agent statuses.
pub fn format_status_table(statuses: &[AgentStatus]) -> String {
    let width = statuses
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut out = format!("{:<width$}  {:<8}  {:<9}  DESCRIPTION\n", "NAME", "STATE", "SCHEDULES");
    for status in statuses {
        let state = match (status.enabled, status.running) {
            (_, true) => "running",
            (true, false) => "stopped",
            (false, false) => "disabled",
        };
        out.push_str(
            format!(
                "{:<width$}  {:<8}  {:<9}  {}",
                status.name, state, status.schedules, status.description
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

// ============================================================================
// start / stop
// ============================================================================

pub fn cmd_start(args: StartArgs) -> Result<()> {
    let rt = Runtime::resolve()?;
    let agent = load_agent(&rt.ctx, &args.name)?;
    let report = rt.sessions().start(&agent, args.working_dir.as_deref())?;
    print_start_report(&report);
    Ok(())
}

fn print_start_report(report: &StartReport) {
    println!("Started '{}' in session '{}'", report.agent, report.session);
    println!("  Directory: {}", report.working_dir.display());
    println!("  Command:   {}", shell_words::join(&report.command));
    println!("  Provider:  {}", report.provider);
    if !report.skills_loaded.is_empty() {
        println!("  Skills:    {}", report.skills_loaded.join(", "));
    }
    if !report.skills_missing.is_empty() {
        println!("  Missing:   {} (skipped)", report.skills_missing.join(", "));
    }
    println!();
    println!("Attach with: tmux attach -t {}", report.session);
}

pub fn cmd_stop(args: AgentArg) -> Result<()> {
    let rt = Runtime::resolve()?;
    let agent = load_agent(&rt.ctx, &args.name)?;
    let sessions = rt.sessions();
    sessions.stop(&agent.name)?;
    println!(
        "Stopped '{}' (session '{}')",
        agent.name,
        sessions.session_name(&agent.name)
    );
    Ok(())
}

// ============================================================================
// monitor
// ============================================================================

pub fn cmd_monitor(args: MonitorArgs) -> Result<()> {
    let rt = Runtime::resolve()?;
    let agent = load_agent(&rt.ctx, &args.name)?;
    let sessions = rt.sessions();

    if args.follow {
        signal::install();
        let snapshots = sessions.follow(&agent.name, args.lines, signal::interrupted_flag());
        let stdout = io::stdout();
        return write_follow(snapshots, &mut stdout.lock());
    }

    let output = sessions.monitor(&agent.name, args.lines)?;
    if output.is_empty() && !sessions.is_running(&agent.name)? {
        eprintln!("Agent '{}' is not running.", agent.name);
        return Ok(());
    }
    println!("{}", output);
    Ok(())
}

/// Print the first snapshot whole, then only what each later one adds.
pub fn write_follow<I, W>(snapshots: I, out: &mut W) -> Result<()>
where
    I: Iterator<Item = Result<String>>,
    W: Write,
{
    let mut previous: Option<String> = None;
    for snapshot in snapshots {
        let snapshot = snapshot?;
        let fresh: Vec<&str> = match &previous {
            Some(prev) => new_lines(prev, &snapshot),
            None => snapshot.lines().collect(),
        };
        for line in fresh {
            writeln!(out, "{}", line).map_err(stdout_error)?;
        }
        out.flush().map_err(stdout_error)?;
        previous = Some(snapshot);
    }
    Ok(())
}

fn stdout_error(e: io::Error) -> ManagerError {
    ManagerError::Config(format!("failed to write output: {}", e))
}

// ============================================================================
// send / assign
// ============================================================================

pub fn cmd_send(args: SendArgs) -> Result<()> {
    let rt = Runtime::resolve()?;
    let agent = load_agent(&rt.ctx, &args.name)?;
    let sessions = rt.sessions();
    send_text(&sessions, &agent, &args.text, args.submit)?;
    if args.submit {
        println!("Sent and submitted to '{}'", agent.name);
    } else {
        println!("Sent to '{}' (not submitted)", agent.name);
    }
    Ok(())
}

/// Type `text` and optionally press Enter.
pub fn send_text(
    sessions: &SessionController<'_>,
    agent: &AgentConfig,
    text: &str,
    submit: bool,
) -> Result<()> {
    sessions.send(&agent.name, text)?;
    if submit {
        sessions.submit(&agent.name)?;
    }
    Ok(())
}

pub fn cmd_assign(args: AssignArgs) -> Result<()> {
    let rt = Runtime::resolve()?;
    let agent = load_agent(&rt.ctx, &args.name)?;
    let task = read_task(args.task_file.as_deref(), io::stdin().lock())?;

    let report = rt.sessions().assign(&agent, &task)?;
    if let Some(started) = &report.started {
        print_start_report(started);
        println!();
    }
    println!("Assigned task to '{}' (session '{}')", agent.name, report.session);
    Ok(())
}

/// Task text from `task_file`, or everything on `stdin` when there is none.
pub fn read_task<R: Read>(task_file: Option<&Path>, mut stdin: R) -> Result<String> {
    let task = match task_file {
        Some(path) => fs::read_to_string(path).map_err(|e| {
            ManagerError::Config(format!(
                "failed to read task file '{}': {}",
                path.display(),
                e
            ))
        })?,
        None => {
            let mut buf = String::new();
            stdin
                .read_to_string(&mut buf)
                .map_err(|e| ManagerError::Config(format!("failed to read task from stdin: {}", e)))?;
            buf
        }
    };

    if task.trim().is_empty() {
        return Err(ManagerError::Validation(
            "task is empty; pass --task-file or pipe the task on stdin".to_string(),
        ));
    }
    Ok(task)
}
