//! Tests for the doctor command.

use super::*;
use crate::error::ManagerError;
use crate::schedule::{END_SENTINEL, START_SENTINEL};
use crate::session::SessionController;
use crate::test_support::{
    FakeMultiplexer, MemoryCrontab, StaticLaunchers, TestProject, agent_doc, fast_timing,
};

#[test]
fn test_tmux_availability() {
    let mut report = DoctorReport::new();
    check_tmux(Ok("tmux 3.4".to_string()), &mut report);
    assert!(!report.has_issues());
    assert_eq!(report.passed, vec!["tmux 3.4 available"]);

    let mut report = DoctorReport::new();
    check_tmux(
        Err(ManagerError::ExternalToolMissing("tmux".to_string())),
        &mut report,
    );
    assert!(report.has_category("tmux_missing"));
    assert_eq!(report.error_count(), 1);
}

#[test]
fn test_crontab_file_directory() {
    let mut project = TestProject::new();
    project.ctx.config.crontab_file = Some("${REPO_ROOT}/cron/crontab".to_string());

    let mut report = DoctorReport::new();
    check_crontab(&project.ctx, &mut report);
    assert!(report.has_category("crontab_file_dir_missing"));

    std::fs::create_dir_all(project.root().join("cron")).unwrap();
    let mut report = DoctorReport::new();
    check_crontab(&project.ctx, &mut report);
    assert!(!report.has_issues());
}

#[test]
fn test_corrupt_managed_block_is_an_error() {
    let store = MemoryCrontab::with(&format!("{}\n0 1 * * * x\n", START_SENTINEL));
    let mut report = DoctorReport::new();

    check_managed_block(&store, &mut report);

    assert!(report.has_category("corrupt_managed_block"));
    assert_eq!(report.error_count(), 1);

    let store = MemoryCrontab::with(&format!("{}\n{}\n", START_SENTINEL, END_SENTINEL));
    let mut report = DoctorReport::new();
    check_managed_block(&store, &mut report);
    assert!(!report.has_issues());
}

#[test]
fn test_agents_checks() {
    let project = TestProject::new();
    let mut report = DoctorReport::new();
    let agents = check_agents(&project.ctx, &mut report).unwrap();
    assert!(agents.is_empty());
    assert!(report.has_category("no_agents"));
    assert_eq!(report.error_count(), 0);

    project.write_agent("alpha", &agent_doc("alpha", "", ""));
    project.write_agent("broken", "---\nname: broken\n---\n");
    let mut report = DoctorReport::new();
    let agents = check_agents(&project.ctx, &mut report).unwrap();
    assert_eq!(agents.len(), 1);
    assert!(report.has_category("invalid_agent"));
    assert_eq!(report.error_count(), 1);

    std::fs::remove_dir_all(&project.ctx.agents_dir).unwrap();
    let mut report = DoctorReport::new();
    check_agents(&project.ctx, &mut report).unwrap();
    assert!(report.has_category("agents_dir_missing"));
}

#[test]
fn test_skill_dirs_only_matter_when_declared() {
    let project = TestProject::new();
    project.write_agent("alpha", &agent_doc("alpha", "", ""));
    let mut report = DoctorReport::new();
    let agents = check_agents(&project.ctx, &mut report).unwrap();
    check_skill_dirs(&project.ctx, &agents, &mut report);
    assert!(!report.has_category("no_skill_dirs"));

    project.write_agent("alpha", &agent_doc("alpha", "skills: [git]\n", ""));
    let mut report = DoctorReport::new();
    let agents = check_agents(&project.ctx, &mut report).unwrap();
    check_skill_dirs(&project.ctx, &agents, &mut report);
    assert!(report.has_category("no_skill_dirs"));

    project.write_skill("git", "Rebase.\n");
    let mut report = DoctorReport::new();
    check_skill_dirs(&project.ctx, &agents, &mut report);
    assert!(!report.has_issues());
}

#[test]
fn test_deep_agent_checks() {
    let project = TestProject::new();
    project.write_agent(
        "alpha",
        &agent_doc("alpha", "working_directory: missing-dir\nskills: [ghost]\n", ""),
    );
    project.write_agent("beta", &agent_doc("beta", "enabled: false\nworking_directory: nope\n", ""));
    let mut scratch = DoctorReport::new();
    let agents = check_agents(&project.ctx, &mut scratch).unwrap();
    let mux = FakeMultiplexer::new();
    let sessions = SessionController::new(&project.ctx, &mux, &StaticLaunchers, fast_timing());

    let mut report = DoctorReport::new();
    check_agent_runtime(&project.ctx, &sessions, &agents, &mut report);

    assert!(report.has_category("working_dir_missing"));
    assert!(report.has_category("skill_missing"));
    assert!(!report.has_category("launcher_unresolved"));
    // Disabled agents are not resolved.
    assert_eq!(report.issues.len(), 2);
}

#[test]
fn test_schedule_drift() {
    let block = format!("{}\nPATH=/bin\n# a/b\n@daily run\n{}", START_SENTINEL, END_SENTINEL);

    let store = MemoryCrontab::with(&format!("{}\n", block));
    let mut report = DoctorReport::new();
    check_schedule_drift(&store, Some(&block), &mut report);
    assert!(!report.has_issues());

    let mut report = DoctorReport::new();
    check_schedule_drift(&store, None, &mut report);
    assert!(report.has_category("schedules_out_of_sync"));

    let empty = MemoryCrontab::default();
    let mut report = DoctorReport::new();
    check_schedule_drift(&empty, None, &mut report);
    assert!(!report.has_issues());
}

#[test]
fn test_format_report() {
    let mut report = DoctorReport::new();
    report.passed.push("tmux 3.4 available".to_string());
    assert_eq!(
        format_report(&report),
        "  ok  tmux 3.4 available\n\nNo issues detected.\n"
    );

    report.issues.push(
        Issue::new(IssueSeverity::Error, "agents_dir_missing", "Agents directory does not exist")
            .with_path("/p/agents")
            .with_remediation("mkdir -p /p/agents\nthen add a document"),
    );
    let text = format_report(&report);
    assert!(text.contains("  1. [ERROR] agents_dir_missing - Agents directory does not exist\n"));
    assert!(text.contains("     Path: /p/agents\n"));
    assert!(text.contains("     Fix:  mkdir -p /p/agents\n           then add a document\n"));
    assert!(text.ends_with("Summary: 1 errors, 0 warnings.\n"));
}
