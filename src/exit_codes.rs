//! Exit code constants for the agent-manager CLI.
//!
//! Every error category maps to its own code so cron logs and wrapper scripts
//! can tell failures apart:
//! - 0: Success
//! - 1: Configuration error (root resolution, bad settings, task content)
//! - 2: Validation failure (malformed agent document or argument)
//! - 3: Agent, skill or scheduled job not found
//! - 4: Agent is disabled
//! - 5: Session state conflict (already running / not running)
//! - 6: Managed crontab block is corrupt
//! - 7: Scheduled job exceeded its wall-clock cap
//! - 8: External tool missing or failed (tmux, crontab, git)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// Configuration error: unresolvable root, bad settings, missing task content.
pub const CONFIG_ERROR: i32 = 1;

/// Validation failure: malformed agent document, schedule entry or argument.
pub const VALIDATION_FAILURE: i32 = 2;

/// Lookup failure: unknown agent, skill or scheduled job.
pub const NOT_FOUND: i32 = 3;

/// The agent has `enabled: false`.
pub const DISABLED: i32 = 4;

/// Session already running, or not running when it must be.
pub const SESSION_STATE: i32 = 5;

/// The sentinel-delimited crontab block could not be located unambiguously.
pub const CORRUPT_CRONTAB: i32 = 6;

/// A scheduled job was terminated after exceeding its runtime cap.
pub const TIMEOUT: i32 = 7;

/// An external collaborator (tmux, crontab, git) is missing or failed.
pub const EXTERNAL_TOOL_FAILURE: i32 = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            SUCCESS,
            CONFIG_ERROR,
            VALIDATION_FAILURE,
            NOT_FOUND,
            DISABLED,
            SESSION_STATE,
            CORRUPT_CRONTAB,
            TIMEOUT,
            EXTERNAL_TOOL_FAILURE,
        ];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn only_success_is_zero() {
        assert_eq!(SUCCESS, 0);
        assert!(CONFIG_ERROR > 0);
        assert!(TIMEOUT > 0);
        assert!(EXTERNAL_TOOL_FAILURE > 0);
    }
}
