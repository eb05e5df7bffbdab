//! Health check functions for the doctor command.

use super::{DoctorReport, Issue, IssueSeverity};
use crate::agent::{AgentConfig, list_agents, load_skills};
use crate::context::ManagerContext;
use crate::error::Result;
use crate::schedule::{CrontabStore, managed_block};
use crate::session::SessionController;

/// Check that tmux is installed; `version` is the result of probing it.
pub fn check_tmux(version: Result<String>, report: &mut DoctorReport) {
    match version {
        Ok(version) => report.passed.push(format!("{} available", version)),
        Err(e) => report.issues.push(
            Issue::new(IssueSeverity::Error, "tmux_missing", &e.to_string())
                .with_remediation("Install tmux (e.g. `apt install tmux` or `brew install tmux`)"),
        ),
    }
}

/// Check that the crontab the schedules go to can be used.
pub fn check_crontab(ctx: &ManagerContext, report: &mut DoctorReport) {
    if let Some(file) = &ctx.config.crontab_file {
        let path = ctx.resolve_path(file);
        match path.parent() {
            Some(parent) if parent.is_dir() => {
                report
                    .passed
                    .push(format!("crontab file {}", path.display()));
            }
            _ => report.issues.push(
                Issue::new(
                    IssueSeverity::Error,
                    "crontab_file_dir_missing",
                    "Directory for the configured crontab file does not exist",
                )
                .with_path(&path.display().to_string())
                .with_remediation("Create the directory or change `crontab_file` in config.yaml"),
            ),
        }
        return;
    }

    match which::which("crontab") {
        Ok(path) => report
            .passed
            .push(format!("crontab available at {}", path.display())),
        Err(_) => report.issues.push(
            Issue::new(
                IssueSeverity::Error,
                "crontab_missing",
                "crontab is not installed or not on PATH; schedules cannot be synced",
            )
            .with_remediation("Install cron, or set `crontab_file` in config.yaml"),
        ),
    }
}

/// Check that the managed block in the crontab is well formed.
pub fn check_managed_block(store: &dyn CrontabStore, report: &mut DoctorReport) {
    let current = match store.read() {
        Ok(current) => current,
        Err(e) => {
            report.issues.push(Issue::new(
                IssueSeverity::Warning,
                "crontab_unreadable",
                &format!("Could not read {}: {}", store.describe(), e),
            ));
            return;
        }
    };

    match managed_block(&current) {
        Ok(Some(_)) => report
            .passed
            .push(format!("managed block in {} is well formed", store.describe())),
        Ok(None) => report
            .passed
            .push(format!("no managed block in {} yet", store.describe())),
        Err(e) => report.issues.push(
            Issue::new(IssueSeverity::Error, "corrupt_managed_block", &e.to_string())
                .with_path(&store.describe())
                .with_remediation(
                    "Edit the crontab by hand (crontab -e) so exactly one start and one end\n\
                     sentinel remain, then run `agent-manager schedule sync`",
                ),
        ),
    }
}

/// Check the agents directory and every document in it.
///
/// Returns the agents that loaded.
pub fn check_agents(ctx: &ManagerContext, report: &mut DoctorReport) -> Result<Vec<AgentConfig>> {
    if !ctx.agents_dir.is_dir() {
        report.issues.push(
            Issue::new(
                IssueSeverity::Error,
                "agents_dir_missing",
                "Agents directory does not exist",
            )
            .with_path(&ctx.agents_dir.display().to_string())
            .with_remediation(&format!("mkdir -p {}", ctx.agents_dir.display())),
        );
        return Ok(Vec::new());
    }

    let listing = list_agents(ctx)?;
    for invalid in &listing.invalid {
        report.issues.push(
            Issue::new(IssueSeverity::Error, "invalid_agent", &invalid.reason)
                .with_path(&invalid.path.display().to_string()),
        );
    }

    if listing.agents.is_empty() {
        report.issues.push(
            Issue::new(
                IssueSeverity::Warning,
                "no_agents",
                "No agent documents found",
            )
            .with_path(&ctx.agents_dir.display().to_string())
            .with_remediation("Add a <name>.md file with `name` and `launcher` in its frontmatter"),
        );
    } else {
        report
            .passed
            .push(format!("{} agent(s) loaded", listing.agents.len()));
    }
    Ok(listing.agents)
}

/// Warn when agents declare skills but no skills directory exists.
pub fn check_skill_dirs(ctx: &ManagerContext, agents: &[AgentConfig], report: &mut DoctorReport) {
    if agents.iter().all(|a| a.skills.is_empty()) {
        return;
    }

    let dirs = ctx.skill_search_dirs();
    let existing: Vec<_> = dirs.iter().filter(|d| d.is_dir()).collect();
    if existing.is_empty() {
        let searched: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
        report.issues.push(
            Issue::new(
                IssueSeverity::Warning,
                "no_skill_dirs",
                "Agents declare skills but no skills directory exists",
            )
            .with_remediation(&format!("Create one of:\n{}", searched.join("\n"))),
        );
    } else {
        report
            .passed
            .push(format!("{} skills director(ies) found", existing.len()));
    }
}

/// Resolve what `start` would resolve for every enabled agent.
pub fn check_agent_runtime(
    ctx: &ManagerContext,
    sessions: &SessionController<'_>,
    agents: &[AgentConfig],
    report: &mut DoctorReport,
) {
    for agent in agents.iter().filter(|a| a.enabled) {
        let path = agent.source.display().to_string();

        if let Err(e) = sessions.resolve_working_dir(agent, None) {
            report.issues.push(
                Issue::new(IssueSeverity::Error, "working_dir_missing", &e.to_string())
                    .with_path(&path),
            );
        }

        if let Err(e) = sessions.provider_for(agent) {
            report.issues.push(
                Issue::new(
                    IssueSeverity::Error,
                    "launcher_unresolved",
                    &format!("Agent '{}': {}", agent.name, e),
                )
                .with_path(&path),
            );
        }

        for missing in load_skills(ctx, &agent.skills).missing {
            report.issues.push(
                Issue::new(
                    IssueSeverity::Warning,
                    "skill_missing",
                    &format!("Agent '{}' declares skill '{}' which was not found", agent.name, missing),
                )
                .with_path(&path),
            );
        }
    }
}

/// Compare the installed managed block with the one a sync would write.
pub fn check_schedule_drift(
    store: &dyn CrontabStore,
    expected: Option<&str>,
    report: &mut DoctorReport,
) {
    let Ok(current) = store.read() else {
        // Already reported by check_managed_block.
        return;
    };
    let Ok(installed) = managed_block(&current) else {
        return;
    };

    if installed.as_deref() == expected {
        report.passed.push("installed schedules are in sync".to_string());
    } else {
        report.issues.push(
            Issue::new(
                IssueSeverity::Warning,
                "schedules_out_of_sync",
                "Installed schedules differ from the agent documents",
            )
            .with_path(&store.describe())
            .with_remediation("agent-manager schedule sync"),
        );
    }
}
