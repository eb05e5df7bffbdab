//! Where the crontab text lives.
//!
//! Every store is read and written as a whole file; there are no partial
//! in-place edits.

use crate::context::ManagerContext;
use crate::error::{ManagerError, Result};
use crate::fs::atomic_write_file;
use crate::process;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Whole-text access to a crontab.
pub trait CrontabStore {
    /// Current text; empty when there is no crontab yet.
    fn read(&self) -> Result<String>;

    /// Replace the whole crontab.
    fn write(&self, content: &str) -> Result<()>;

    /// Human-readable location, for reports.
    fn describe(&self) -> String;
}

/// The invoking user's crontab, via `crontab -l` and `crontab -`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCrontab;

impl CrontabStore for SystemCrontab {
    fn read(&self) -> Result<String> {
        let out = process::run("crontab", &["-l"], None, None)?;
        if out.success() {
            return Ok(out.stdout);
        }
        if out.stderr.contains("no crontab for") {
            debug!("no crontab installed yet");
            return Ok(String::new());
        }
        Err(ManagerError::ExternalCommand(format!(
            "crontab -l failed: {}",
            out.diagnostic()
        )))
    }

    fn write(&self, content: &str) -> Result<()> {
        process::run_checked("crontab", &["-"], None, Some(content))?;
        Ok(())
    }

    fn describe(&self) -> String {
        "user crontab".to_string()
    }
}

/// A crontab kept in a plain file, replaced atomically.
#[derive(Debug, Clone)]
pub struct FileCrontab {
    path: PathBuf,
}

impl FileCrontab {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CrontabStore for FileCrontab {
    fn read(&self) -> Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(ManagerError::Config(format!(
                "failed to read crontab file '{}': {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn write(&self, content: &str) -> Result<()> {
        atomic_write_file(&self.path, content)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// The store selected by settings: `crontab_file` when set, else the system crontab.
pub fn store_for(ctx: &ManagerContext) -> Box<dyn CrontabStore> {
    match &ctx.config.crontab_file {
        Some(path) => Box::new(FileCrontab::new(ctx.resolve_path(path))),
        None => Box::new(SystemCrontab),
    }
}
