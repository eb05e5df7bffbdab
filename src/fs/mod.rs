//! Filesystem helpers.
//!
//! Whole-file replacement for the file-backed crontab store and log pruning
//! for the cron log directory.

pub mod atomic;
mod prune;

pub use atomic::atomic_write_file;
pub use prune::prune_older_than;
