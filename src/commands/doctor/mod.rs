//! Implementation of the `agent-manager doctor` command.
//!
//! Reports, without changing anything:
//! - tmux and crontab availability
//! - the agents directory and every document that fails to load
//! - skill directories, when any agent declares skills
//! - a corrupt managed crontab block
//!
//! With `--deep` it also resolves each enabled agent's working directory,
//! launcher and skills, and compares the installed schedules with what
//! `schedule sync` would write.

mod checks;
mod display;

#[cfg(test)]
mod tests;

use super::Runtime;
use crate::cli::DoctorArgs;
use crate::error::{ManagerError, Result};
use crate::schedule::{collect_jobs, layout_for, render_block, store_for};

pub use checks::*;
pub use display::*;

/// Severity level for issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Warning: potential problem but not critical.
    Warning,
    /// Error: something is wrong and should be fixed.
    Error,
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueSeverity::Warning => write!(f, "WARNING"),
            IssueSeverity::Error => write!(f, "ERROR"),
        }
    }
}

/// A detected issue with a recommended fix.
#[derive(Debug, Clone)]
pub struct Issue {
    pub severity: IssueSeverity,
    /// Short machine-friendly category, e.g. `tmux_missing`.
    pub category: String,
    pub description: String,
    /// Path or identifier involved.
    pub path: Option<String>,
    /// Recommended remediation command or action.
    pub remediation: Option<String>,
}

impl Issue {
    pub fn new(severity: IssueSeverity, category: &str, description: &str) -> Self {
        Self {
            severity,
            category: category.to_string(),
            description: description.to_string(),
            path: None,
            remediation: None,
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn with_remediation(mut self, remediation: &str) -> Self {
        self.remediation = Some(remediation.to_string());
        self
    }
}

/// Result of running the doctor checks.
#[derive(Debug, Default)]
pub struct DoctorReport {
    pub issues: Vec<Issue>,
    /// Things that were checked and found fine.
    pub passed: Vec<String>,
}

impl DoctorReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .count()
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.issues.iter().any(|i| i.category == category)
    }
}

/// Execute the `agent-manager doctor` command.
pub fn cmd_doctor(args: DoctorArgs) -> Result<()> {
    let rt = Runtime::resolve()?;
    let ctx = &rt.ctx;
    let mut report = DoctorReport::new();

    check_tmux(rt.tmux.version(), &mut report);
    check_crontab(ctx, &mut report);
    let store = store_for(ctx);
    check_managed_block(store.as_ref(), &mut report);
    let agents = check_agents(ctx, &mut report)?;
    check_skill_dirs(ctx, &agents, &mut report);

    if args.deep {
        let sessions = rt.sessions();
        check_agent_runtime(ctx, &sessions, &agents, &mut report);
        let layout = layout_for(ctx)?;
        let expected = render_block(&collect_jobs(&agents), &layout);
        check_schedule_drift(store.as_ref(), expected.as_deref(), &mut report);
    }

    print!("{}", format_report(&report));

    let errors = report.error_count();
    if errors > 0 {
        return Err(ManagerError::Validation(format!(
            "doctor found {} error(s)",
            errors
        )));
    }
    Ok(())
}
