//! Core ManagerConfig struct and default value functions.

use serde::{Deserialize, Serialize};

/// Settings for agent-manager.
///
/// This struct represents the contents of `.agent-manager/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    // =========================================================================
    // Layout
    // =========================================================================
    /// Directory holding agent documents, relative to the project root.
    #[serde(default = "default_agents_dir")]
    pub agents_dir: String,

    /// Directory for scheduled job logs, relative to the project root.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Scheduled job logs older than this many days are pruned on `schedule run`.
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,

    // =========================================================================
    // Sessions
    // =========================================================================
    /// Prefix of every tmux session name owned by agent-manager.
    #[serde(default = "default_session_prefix")]
    pub session_prefix: String,

    /// Interval between pane snapshots in follow mode and while waiting on jobs.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Minimum wait after creating a session before looking for a prompt.
    #[serde(default = "default_startup_wait_ms")]
    pub startup_wait_ms: u64,

    /// Upper bound on waiting for a launcher prompt before injecting context.
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    /// Consecutive unchanged snapshots after which a job counts as finished.
    #[serde(default = "default_settle_polls")]
    pub settle_polls: u32,

    // =========================================================================
    // Scheduling
    // =========================================================================
    /// How long `schedule run` waits for a job without `max_runtime`.
    ///
    /// Unlike `max_runtime`, expiry of this wait does not kill the session.
    #[serde(default = "default_job_wait_secs")]
    pub default_job_wait_secs: u64,

    /// PATH given to every managed cron command. `$HOME` and `${VAR}` are
    /// expanded at sync time.
    #[serde(default = "default_cron_path")]
    pub cron_path: String,

    /// Write schedules to this file instead of the user's system crontab.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crontab_file: Option<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            agents_dir: default_agents_dir(),
            log_dir: default_log_dir(),
            log_retention_days: default_log_retention_days(),
            session_prefix: default_session_prefix(),
            poll_interval_ms: default_poll_interval_ms(),
            startup_wait_ms: default_startup_wait_ms(),
            ready_timeout_secs: default_ready_timeout_secs(),
            settle_polls: default_settle_polls(),
            default_job_wait_secs: default_job_wait_secs(),
            cron_path: default_cron_path(),
            crontab_file: None,
        }
    }
}

fn default_agents_dir() -> String {
    "agents".to_string()
}

fn default_log_dir() -> String {
    ".crontab_logs".to_string()
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_session_prefix() -> String {
    "agent-".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_startup_wait_ms() -> u64 {
    1000
}

fn default_ready_timeout_secs() -> u64 {
    30
}

fn default_settle_polls() -> u32 {
    3
}

fn default_job_wait_secs() -> u64 {
    600
}

fn default_cron_path() -> String {
    "$HOME/.local/bin:$HOME/bin:/usr/local/bin:/opt/homebrew/bin:/usr/bin:/bin".to_string()
}
