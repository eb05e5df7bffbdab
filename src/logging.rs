//! Diagnostic logging to stderr.
//!
//! Command output goes to stdout; everything emitted through `tracing` goes to
//! stderr so it never mixes with what scripts parse.

use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the log filter, e.g. `debug` or `agent_manager=info`.
pub const LOG_ENV_VAR: &str = "AGENT_MANAGER_LOG";

const DEFAULT_LEVEL: &str = "warn";

/// Initialize the global subscriber.
///
/// `verbose` forces `debug`; otherwise the filter comes from
/// [`LOG_ENV_VAR`], falling back to `warn`. Safe to call more than once.
pub fn init(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}
