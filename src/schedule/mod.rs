//! Schedule synchronization and on-demand job execution.
//!
//! `sync` turns every enabled schedule of every enabled agent into one line
//! of a sentinel-delimited block in the crontab. Each line calls back into
//! this binary as `schedule run <agent> --job <job>`, which [`run_job`]
//! executes with an optional wall-clock cap.

mod block;
mod crontab;
mod runner;


pub use block::{
    BlockLayout, END_SENTINEL, START_SENTINEL, managed_block, managed_entry_count, render_block,
    splice_block,
};
pub use crontab::{CrontabStore, FileCrontab, SystemCrontab, store_for};
pub use runner::{JobOutcome, JobReport, JobTiming, resolve_task, run_job};

use crate::agent::{AgentConfig, ScheduleEntry};
use crate::context::ManagerContext;
use crate::error::{ManagerError, Result};
use regex::{NoExpand, Regex};
use serde::Serialize;
use similar::TextDiff;
use std::env;
use std::sync::LazyLock;
use tracing::info;

static HOME_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(?:\{HOME\}|HOME\b)").expect("Invalid home variable regex"));

/// One schedule entry together with its agent's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub agent: String,
    #[serde(flatten)]
    pub entry: ScheduleEntry,
}

/// Enabled schedule entries of enabled agents, by agent then schedule name.
///
/// A disabled agent contributes nothing regardless of its entries' flags.
pub fn collect_jobs(agents: &[AgentConfig]) -> Vec<Job> {
    let mut jobs: Vec<Job> = agents
        .iter()
        .filter(|agent| agent.enabled)
        .flat_map(|agent| {
            agent
                .schedules
                .iter()
                .filter(|entry| entry.enabled)
                .map(|entry| Job {
                    agent: agent.name.clone(),
                    entry: entry.clone(),
                })
        })
        .collect();
    jobs.sort_by(|a, b| (&a.agent, &a.entry.name).cmp(&(&b.agent, &b.entry.name)));
    jobs
}

/// Layout for this installation: project root, log directory, and the
/// canonical path of the running executable.
pub fn layout_for(ctx: &ManagerContext) -> Result<BlockLayout> {
    let exe = env::current_exe()
        .and_then(|p| p.canonicalize())
        .map_err(|e| {
            ManagerError::Config(format!("failed to locate the agent-manager executable: {}", e))
        })?;
    Ok(BlockLayout {
        root: ctx.repo_root.clone(),
        log_dir: ctx.log_dir.clone(),
        exe,
        cron_path: expand_cron_path(ctx),
    })
}

/// The configured cron `PATH` with `$HOME`, `${HOME}` and other `${VAR}`
/// tokens expanded; cron itself expands none of them.
pub fn expand_cron_path(ctx: &ManagerContext) -> String {
    let value = match &ctx.home_dir {
        Some(home) => HOME_VAR
            .replace_all(&ctx.config.cron_path, NoExpand(&home.to_string_lossy()))
            .into_owned(),
        None => ctx.config.cron_path.clone(),
    };
    ctx.expand_template(&value)
}

/// Result of a sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Entries in the managed block before the sync.
    pub previous_entries: usize,
    /// Entries in the managed block after the sync.
    pub entries: usize,
    /// Unified diff of the crontab; empty when nothing changed.
    pub diff: String,
    /// The rendered block, if there are any jobs.
    pub block: Option<String>,
    pub dry_run: bool,
    /// Whether the crontab was rewritten.
    pub written: bool,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        !self.diff.is_empty()
    }
}

/// Splice `block` into the crontab held by `store`.
///
/// The crontab is read once and, unless `dry_run`, written back in full only
/// when the spliced text differs.
pub fn sync(store: &dyn CrontabStore, block: Option<&str>, dry_run: bool) -> Result<SyncReport> {
    let current = store.read()?;
    let updated = splice_block(&current, block)?;

    let diff = if current == updated {
        String::new()
    } else {
        TextDiff::from_lines(&current, &updated)
            .unified_diff()
            .context_radius(3)
            .header("crontab (current)", "crontab (updated)")
            .to_string()
    };

    let written = !dry_run && current != updated;
    if written {
        store.write(&updated)?;
        info!(store = %store.describe(), "crontab updated");
    }

    Ok(SyncReport {
        previous_entries: managed_entry_count(&current),
        entries: managed_entry_count(&updated),
        diff,
        block: block.map(str::to_string),
        dry_run,
        written,
    })
}

/// Collect, render and sync every schedule under `ctx`.
pub fn sync_schedules(
    ctx: &ManagerContext,
    agents: &[AgentConfig],
    store: &dyn CrontabStore,
    dry_run: bool,
) -> Result<SyncReport> {
    let jobs = collect_jobs(agents);
    let layout = layout_for(ctx)?;
    let block = render_block(&jobs, &layout);
    sync(store, block.as_deref(), dry_run)
}
