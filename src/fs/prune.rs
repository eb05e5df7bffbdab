//! Retention for the cron log directory.

use crate::error::{ManagerError, Result};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Delete `*.log` files in `dir` last modified more than `max_age` ago.
///
/// A missing directory is not an error. Files that cannot be inspected or
/// removed are logged and skipped. Returns the number of files deleted.
pub fn prune_older_than(dir: &Path, max_age: Duration) -> Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(ManagerError::Config(format!(
                "failed to read log directory '{}': {}",
                dir.display(),
                e
            )));
        }
    };

    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        let Some(age) = age else {
            continue;
        };

        if age > max_age {
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "pruned old log");
                    removed += 1;
                }
                Err(e) => warn!(path = %path.display(), "failed to prune log: {}", e),
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn backdate(path: &Path, age: Duration) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_removes_only_old_logs() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("alpha-daily.log");
        let fresh = dir.path().join("alpha-weekly.log");
        let other = dir.path().join("notes.txt");
        for path in [&old, &fresh, &other] {
            fs::write(path, "x").unwrap();
        }
        backdate(&old, DAY * 10);
        backdate(&other, DAY * 10);

        let removed = prune_older_than(dir.path(), DAY * 7).unwrap();

        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_missing_directory_is_fine() {
        let dir = TempDir::new().unwrap();
        let removed = prune_older_than(&dir.path().join("nope"), DAY).unwrap();
        assert_eq!(removed, 0);
    }
}
