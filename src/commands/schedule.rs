//! Schedule commands: list, sync, run.

use super::Runtime;
use crate::agent::{AgentConfig, format_duration, list_agents};
use crate::cli::{ScheduleListArgs, ScheduleRunArgs, ScheduleSyncArgs};
use crate::context::ManagerContext;
use crate::error::{ManagerError, Result};
use crate::schedule::{
    CrontabStore, JobOutcome, JobReport, JobTiming, SyncReport, run_job, store_for, sync_schedules,
};
use chrono::Utc;
use serde::Serialize;

/// One row of `schedule list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleRow {
    pub agent: String,
    pub job: String,
    pub cron: String,
    /// Installed by `sync`: both the agent and the entry are enabled.
    pub active: bool,
    pub max_runtime: Option<String>,
    pub task: String,
    pub log_file: String,
}

// ============================================================================
// list
// ============================================================================

pub fn cmd_schedule_list(args: ScheduleListArgs) -> Result<()> {
    let ctx = ManagerContext::resolve()?;
    let listing = list_agents(&ctx)?;
    for invalid in &listing.invalid {
        eprintln!(
            "Warning: skipping {}: {}",
            invalid.path.display(),
            invalid.reason
        );
    }
    let rows = schedule_rows(&ctx, &listing.agents);

    if args.json {
        let json = serde_json::to_string_pretty(&rows).map_err(|e| {
            ManagerError::Config(format!("failed to serialize schedule list: {}", e))
        })?;
        println!("{}", json);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No schedules defined.");
        return Ok(());
    }
    for row in &rows {
        let state = if row.active { "" } else { "  (disabled)" };
        println!("{}/{}{}", row.agent, row.job, state);
        println!("  Cron:    {}", row.cron);
        if let Some(limit) = &row.max_runtime {
            println!("  Limit:   {}", limit);
        }
        println!("  Task:    {}", row.task);
        println!("  Log:     {}", row.log_file);
        println!();
    }
    Ok(())
}

/// Every schedule entry of every agent, including disabled ones.
pub fn schedule_rows(ctx: &ManagerContext, agents: &[AgentConfig]) -> Vec<ScheduleRow> {
    agents
        .iter()
        .flat_map(|agent| {
            agent.schedules.iter().map(move |entry| ScheduleRow {
                agent: agent.name.clone(),
                job: entry.name.clone(),
                cron: entry.cron.clone(),
                active: agent.enabled && entry.enabled,
                max_runtime: entry.max_runtime.map(format_duration),
                task: match (&entry.task, &entry.task_file) {
                    (Some(task), _) => summarize(task),
                    (None, Some(file)) => format!("file: {}", file),
                    (None, None) => "(none)".to_string(),
                },
                log_file: ctx
                    .job_log_path(&agent.name, &entry.name)
                    .display()
                    .to_string(),
            })
        })
        .collect()
}

/// First line of a task, shortened for one-line display.
fn summarize(task: &str) -> String {
    const MAX: usize = 60;
    let first = task.lines().next().unwrap_or("").trim();
    if first.chars().count() > MAX {
        let cut: String = first.chars().take(MAX - 3).collect();
        format!("{}...", cut)
    } else {
        first.to_string()
    }
}

// ============================================================================
// sync
// ============================================================================

pub fn cmd_schedule_sync(args: ScheduleSyncArgs) -> Result<()> {
    let ctx = ManagerContext::resolve()?;
    let listing = list_agents(&ctx)?;
    for invalid in &listing.invalid {
        eprintln!(
            "Warning: {} has no schedules installed: {}",
            invalid.path.display(),
            invalid.reason
        );
    }

    let store = store_for(&ctx);
    let report = sync_schedules(&ctx, &listing.agents, store.as_ref(), args.dry_run)?;
    print!("{}", format_sync_report(&report, &store.describe()));
    Ok(())
}

/// Human-readable summary of a sync, diff included.
pub fn format_sync_report(report: &SyncReport, target: &str) -> String {
    let mut out = String::new();
    if report.dry_run
        && let Some(block) = &report.block
    {
        out.push_str(&format!("Managed block:\n{}\n\n", block));
    }
    if !report.changed() {
        out.push_str(&format!(
            "Crontab ({}) is up to date: {} scheduled job(s).\n",
            target, report.entries
        ));
        return out;
    }

    out.push_str(&report.diff);
    if !report.diff.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    if report.dry_run {
        out.push_str(&format!(
            "Dry run: {} would go from {} to {} scheduled job(s). Nothing was written.\n",
            target, report.previous_entries, report.entries
        ));
    } else {
        out.push_str(&format!(
            "Updated {}: {} -> {} scheduled job(s).\n",
            target, report.previous_entries, report.entries
        ));
    }
    out
}

// ============================================================================
// run
// ============================================================================

pub fn cmd_schedule_run(args: ScheduleRunArgs) -> Result<()> {
    let rt = Runtime::resolve()?;
    let sessions = rt.sessions();
    let timing = JobTiming::from_config(&rt.ctx.config);

    println!(
        "[{}] starting {}/{}",
        timestamp(),
        args.name,
        args.job
    );
    let report = run_job(&rt.ctx, &sessions, &timing, &args.name, &args.job, args.timeout)
        .inspect_err(|e| println!("[{}] {}/{} failed: {}", timestamp(), args.name, args.job, e))?;
    if let Some(tail) = &report.output_tail {
        print!("{}", format_output_tail(tail));
    }
    println!("[{}] {}", timestamp(), describe_outcome(&report));
    Ok(())
}

/// Agent scroll-back framed for the job log.
pub fn format_output_tail(tail: &str) -> String {
    let body = tail.trim_end();
    if body.is_empty() {
        return String::new();
    }
    format!(
        "----- Agent Output (tail) -----\n{}\n----- End Agent Output -----\n",
        body
    )
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// One-line description of a finished job.
pub fn describe_outcome(report: &JobReport) -> String {
    let job = format!("{}/{}", report.agent, report.job);
    let secs = report.elapsed.as_secs();
    match &report.outcome {
        JobOutcome::Completed => format!("{} completed after {}s", job, secs),
        JobOutcome::Blocked => format!(
            "{} is waiting for approval after {}s; attach to the session to continue",
            job, secs
        ),
        JobOutcome::StillRunning => format!(
            "{} still running after {}s; leaving the session up",
            job, secs
        ),
        JobOutcome::SessionExited => format!("{} session exited after {}s", job, secs),
        JobOutcome::Skipped(reason) => format!("{} skipped: {}", job, reason),
    }
}
