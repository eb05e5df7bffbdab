//! Error types for the agent-manager CLI.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.

use crate::exit_codes;
use std::time::Duration;
use thiserror::Error;

/// Main error type for agent-manager operations.
///
/// Each variant maps to an exit code in [`exit_codes`].
#[derive(Error, Debug)]
pub enum ManagerError {
    /// Project root, settings, working directory or task content is unusable.
    #[error("{0}")]
    Config(String),

    /// An agent document, schedule entry or argument failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No agent document declares the requested name.
    #[error("{0}")]
    NotFound(String),

    /// The agent has `enabled: false`.
    #[error("agent '{0}' is disabled (set `enabled: true` in its document to use it)")]
    Disabled(String),

    /// A session for the agent already exists.
    #[error("agent '{agent}' is already running in session '{session}'")]
    AlreadyRunning { agent: String, session: String },

    /// No session exists for the agent.
    #[error("agent '{0}' is not running")]
    NotRunning(String),

    /// A declared skill could not be found in any search directory.
    ///
    /// Callers treat this as a warning, never as a reason to abort.
    #[error("skill '{0}' not found in any skills directory")]
    SkillNotFound(String),

    /// The managed crontab block sentinels are missing, duplicated or out of order.
    #[error("managed crontab block is corrupt: {0}")]
    CorruptManagedBlock(String),

    /// The agent declares no schedule with the requested job name.
    #[error("schedule '{job}' not found for agent '{agent}'")]
    JobNotFound { agent: String, job: String },

    /// A scheduled job ran past its wall-clock cap and was terminated.
    #[error("job '{agent}/{job}' exceeded its max runtime of {}s and was terminated", limit.as_secs())]
    Timeout {
        agent: String,
        job: String,
        limit: Duration,
    },

    /// A required external tool is not installed or not on PATH.
    #[error("{0} is not installed or not on PATH")]
    ExternalToolMissing(String),

    /// An external tool ran but reported failure.
    #[error("{0}")]
    ExternalCommand(String),
}

impl ManagerError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ManagerError::Config(_) => exit_codes::CONFIG_ERROR,
            ManagerError::Validation(_) => exit_codes::VALIDATION_FAILURE,
            ManagerError::NotFound(_)
            | ManagerError::SkillNotFound(_)
            | ManagerError::JobNotFound { .. } => exit_codes::NOT_FOUND,
            ManagerError::Disabled(_) => exit_codes::DISABLED,
            ManagerError::AlreadyRunning { .. } | ManagerError::NotRunning(_) => {
                exit_codes::SESSION_STATE
            }
            ManagerError::CorruptManagedBlock(_) => exit_codes::CORRUPT_CRONTAB,
            ManagerError::Timeout { .. } => exit_codes::TIMEOUT,
            ManagerError::ExternalToolMissing(_) | ManagerError::ExternalCommand(_) => {
                exit_codes::EXTERNAL_TOOL_FAILURE
            }
        }
    }
}

/// Result type alias for agent-manager operations.
pub type Result<T> = std::result::Result<T, ManagerError>;
