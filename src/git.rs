//! Read-only git queries used for project root discovery.
//!
//! git is optional: when it is missing or the directory is not a repository,
//! these functions return `Ok(None)` and root resolution falls through to the
//! next strategy.

use crate::error::{ManagerError, Result};
use crate::process;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Root of the enclosing superproject when `cwd` is inside a submodule.
///
/// Uses `git rev-parse --show-superproject-working-tree`, which prints nothing
/// when the repository is not a submodule.
pub fn superproject_root(cwd: &Path) -> Result<Option<PathBuf>> {
    rev_parse_path(cwd, "--show-superproject-working-tree")
}

/// Top-level directory of the repository containing `cwd`.
pub fn toplevel(cwd: &Path) -> Result<Option<PathBuf>> {
    rev_parse_path(cwd, "--show-toplevel")
}

fn rev_parse_path(cwd: &Path, flag: &str) -> Result<Option<PathBuf>> {
    let output = match process::run("git", &["rev-parse", flag], Some(cwd), None) {
        Ok(output) => output,
        Err(ManagerError::ExternalToolMissing(_)) => {
            debug!("git not installed; skipping {}", flag);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    if !output.success() {
        // "not a git repository" and friends: not an error for root discovery.
        debug!(flag, stderr = %output.stderr, "git rev-parse declined");
        return Ok(None);
    }

    let path = output.stdout.trim();
    if path.is_empty() {
        Ok(None)
    } else {
        Ok(Some(PathBuf::from(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{add_submodule, create_test_repo};
    use tempfile::TempDir;

    #[test]
    fn test_toplevel_from_subdirectory() {
        let repo = create_test_repo();
        let nested = repo.path().join("src").join("nested");
        std::fs::create_dir_all(&nested).unwrap();

        let root = toplevel(&nested).unwrap().unwrap();
        assert_eq!(
            root.canonicalize().unwrap(),
            repo.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_toplevel_outside_repo_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(toplevel(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_superproject_is_none_for_plain_repo() {
        let repo = create_test_repo();
        assert!(superproject_root(repo.path()).unwrap().is_none());
    }

    #[test]
    fn test_superproject_of_submodule() {
        let project = create_test_repo();
        let tool = create_test_repo();
        add_submodule(project.path(), tool.path(), "tool");

        let submodule = project.path().join("tool");
        let root = superproject_root(&submodule).unwrap().unwrap();
        assert_eq!(
            root.canonicalize().unwrap(),
            project.path().canonicalize().unwrap()
        );
        assert_eq!(
            toplevel(&submodule).unwrap().unwrap().canonicalize().unwrap(),
            submodule.canonicalize().unwrap()
        );
    }
}
