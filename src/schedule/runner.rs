//! Executes one scheduled job: hand the task to the agent, then watch its
//! screen until it settles, blocks, exits, or runs out of time.

use crate::agent::{ScheduleEntry, load_agent};
use crate::config::ManagerConfig;
use crate::context::ManagerContext;
use crate::error::{ManagerError, Result};
use crate::fs::prune_older_than;
use crate::session::SessionController;
use serde::Serialize;
use std::fs;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Scroll-back lines inspected on each poll.
const JOB_PROBE_LINES: usize = 40;

/// Scroll-back lines kept in the report for the job log.
const OUTPUT_TAIL_LINES: usize = 200;

/// How a job run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// The screen stopped changing and shows no activity.
    Completed,
    /// The agent is waiting for a human approval.
    Blocked,
    /// No cap was set and the default wait elapsed; the session keeps running.
    StillRunning,
    /// The session ended on its own.
    SessionExited,
    /// The agent or the schedule entry is disabled, or the agent was busy
    /// with other work when the job fired.
    Skipped(String),
}

/// Summary of one job run.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub agent: String,
    pub job: String,
    pub outcome: JobOutcome,
    pub elapsed: Duration,
    /// Whether the agent had to be started for this run.
    pub started_session: bool,
    /// Old log files removed before the run.
    pub logs_pruned: usize,
    /// Trailing scroll-back once the job settled; `None` when the session
    /// is gone or the job never reached the agent.
    pub output_tail: Option<String>,
}

/// Polling parameters for job runs.
#[derive(Debug, Clone)]
pub struct JobTiming {
    pub poll_interval: Duration,
    /// Consecutive identical idle polls that count as "done".
    pub settle_polls: u32,
    /// How long to watch a job that has no runtime cap.
    pub default_wait: Duration,
    pub log_retention: Duration,
}

impl JobTiming {
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            settle_polls: config.settle_polls,
            default_wait: Duration::from_secs(config.default_job_wait_secs),
            log_retention: Duration::from_secs(u64::from(config.log_retention_days) * 24 * 60 * 60),
        }
    }
}

/// Task text for a schedule entry: exactly one of `task` or `task_file`.
pub fn resolve_task(ctx: &ManagerContext, agent: &str, entry: &ScheduleEntry) -> Result<String> {
    let text = match (&entry.task, &entry.task_file) {
        (Some(task), None) => task.clone(),
        (None, Some(file)) => {
            let path = ctx.resolve_path(file);
            fs::read_to_string(&path).map_err(|e| {
                ManagerError::Config(format!(
                    "failed to read task file '{}' for '{}/{}': {}",
                    path.display(),
                    agent,
                    entry.name,
                    e
                ))
            })?
        }
        _ => {
            return Err(ManagerError::Config(format!(
                "schedule '{}/{}' must set exactly one of 'task' or 'task_file'",
                agent, entry.name
            )));
        }
    };

    if text.trim().is_empty() {
        return Err(ManagerError::Config(format!(
            "schedule '{}/{}' has an empty task",
            agent, entry.name
        )));
    }
    Ok(text)
}

/// Run `job` of `agent_name` now.
///
/// `timeout_override` replaces the entry's `max_runtime`. With a cap, an
/// overrun kills the session and fails with [`ManagerError::Timeout`]; the
/// cap also bounds the wait for a freshly started agent to become ready.
///
/// A running agent that is mid-task or waiting for approval is left alone
/// and the job is skipped until the next trigger.
pub fn run_job(
    ctx: &ManagerContext,
    sessions: &SessionController<'_>,
    timing: &JobTiming,
    agent_name: &str,
    job_name: &str,
    timeout_override: Option<Duration>,
) -> Result<JobReport> {
    let started = Instant::now();
    let agent = load_agent(ctx, agent_name)?;
    let entry = agent
        .schedule(job_name)
        .cloned()
        .ok_or_else(|| ManagerError::JobNotFound {
            agent: agent_name.to_string(),
            job: job_name.to_string(),
        })?;

    let report = |outcome, started_session, logs_pruned| JobReport {
        agent: agent.name.clone(),
        job: entry.name.clone(),
        outcome,
        elapsed: started.elapsed(),
        started_session,
        logs_pruned,
        output_tail: None,
    };

    if !agent.enabled {
        info!(agent = agent_name, job = job_name, "agent disabled; skipping job");
        return Ok(report(JobOutcome::Skipped("agent is disabled".to_string()), false, 0));
    }
    if !entry.enabled {
        info!(agent = agent_name, job = job_name, "schedule disabled; skipping job");
        return Ok(report(JobOutcome::Skipped("schedule is disabled".to_string()), false, 0));
    }

    let task = resolve_task(ctx, &agent.name, &entry)?;

    let logs_pruned = match prune_older_than(&ctx.log_dir, timing.log_retention) {
        Ok(n) => n,
        Err(e) => {
            warn!("log pruning failed: {}", e);
            0
        }
    };

    let provider = sessions.provider_for(&agent)?;
    if let Some(screen) = sessions.snapshot(&agent.name, JOB_PROBE_LINES)? {
        let state = if provider.is_blocked(&screen) {
            Some("waiting for approval")
        } else if provider.is_busy(&screen) {
            Some("busy")
        } else {
            None
        };
        if let Some(state) = state {
            info!(agent = %agent.name, job = %entry.name, state, "agent occupied; skipping job");
            return Ok(report(
                JobOutcome::Skipped(format!(
                    "agent is {}; will retry on next cron execution",
                    state
                )),
                false,
                logs_pruned,
            ));
        }
    }

    let cap = timeout_override.or(entry.max_runtime);
    let assigned = match cap {
        Some(limit) => sessions.bounded_by(started + limit).assign(&agent, &task)?,
        None => sessions.assign(&agent, &task)?,
    };
    info!(agent = %agent.name, job = %entry.name, session = %assigned.session, "job dispatched");

    let limit = cap.unwrap_or(timing.default_wait);
    let mut last_screen: Option<String> = None;
    let mut idle_polls = 0;
    let outcome = loop {
        let elapsed = started.elapsed();
        if elapsed >= limit {
            if let Some(limit) = cap {
                warn!(agent = %agent.name, job = %entry.name, "max runtime exceeded; killing session");
                match sessions.stop(&agent.name) {
                    Ok(()) | Err(ManagerError::NotRunning(_)) => {}
                    Err(e) => warn!("failed to kill session after timeout: {}", e),
                }
                return Err(ManagerError::Timeout {
                    agent: agent.name.clone(),
                    job: entry.name.clone(),
                    limit,
                });
            }
            break JobOutcome::StillRunning;
        }
        thread::sleep(timing.poll_interval.min(limit - elapsed));

        let Some(screen) = sessions.snapshot(&agent.name, JOB_PROBE_LINES)? else {
            break JobOutcome::SessionExited;
        };
        if provider.is_blocked(&screen) {
            break JobOutcome::Blocked;
        }

        if provider.is_busy(&screen) || last_screen.as_deref() != Some(screen.as_str()) {
            idle_polls = 0;
        } else {
            idle_polls += 1;
            if idle_polls >= timing.settle_polls {
                break JobOutcome::Completed;
            }
        }
        debug!(idle_polls, "job poll");
        last_screen = Some(screen);
    };

    info!(agent = %agent.name, job = %entry.name, ?outcome, "job finished");
    let output_tail = match outcome {
        JobOutcome::SessionExited => None,
        _ => sessions.snapshot(&agent.name, OUTPUT_TAIL_LINES)?,
    };
    Ok(JobReport {
        output_tail,
        ..report(outcome, assigned.started.is_some(), logs_pruned)
    })
}
