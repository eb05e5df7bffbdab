//! Project root resolution and path layout for agent-manager.
//!
//! This module is the "environment resolution" layer: it finds the
//! authoritative project root from any working directory, loads the optional
//! settings file beneath it, and derives every other path the manager uses
//! (agents directory, skill search directories, cron logs).
//!
//! All commands resolve a [`ManagerContext`] first, so agent documents are
//! found the same way whether the CLI is invoked from the root, a
//! subdirectory, a vendored submodule, or by cron.

use crate::config::ManagerConfig;
use crate::error::{ManagerError, Result};
use crate::git;
use regex::Regex;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// Environment variable that overrides root discovery.
pub const ROOT_ENV_VAR: &str = "REPO_ROOT";

/// Directory under the project root holding agent-manager's own files.
pub const STATE_DIR: &str = ".agent-manager";

/// Entries that mark a directory as the project root when git is unavailable.
const ROOT_MARKERS: &[&str] = &[STATE_DIR, ".git"];

static TEMPLATE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Invalid template variable regex")
});

/// Resolve the project root from the current working directory.
///
/// Priority order:
/// 1. `REPO_ROOT` when set and pointing at an existing directory
/// 2. the git superproject (this tool vendored as a submodule)
/// 3. the git top-level directory
/// 4. the nearest ancestor containing a root marker
pub fn resolve_repo_root() -> Result<PathBuf> {
    let cwd = env::current_dir().map_err(|e| {
        ManagerError::Config(format!("failed to get current working directory: {}", e))
    })?;

    resolve_repo_root_from(&cwd, env::var_os(ROOT_ENV_VAR))
}

/// Resolve the project root from a specific directory and override value.
///
/// This is useful for testing or when the working directory is known.
pub fn resolve_repo_root_from(cwd: &Path, env_override: Option<OsString>) -> Result<PathBuf> {
    if let Some(value) = env_override.filter(|v| !v.is_empty()) {
        let candidate = PathBuf::from(value);
        if candidate.is_dir() {
            debug!(root = %candidate.display(), "root from {}", ROOT_ENV_VAR);
            return Ok(absolute(&candidate));
        }
        debug!(
            path = %candidate.display(),
            "{} does not exist; ignoring override", ROOT_ENV_VAR
        );
    }

    if let Some(root) = git::superproject_root(cwd)? {
        debug!(root = %root.display(), "root from git superproject");
        return Ok(root);
    }

    if let Some(root) = git::toplevel(cwd)? {
        debug!(root = %root.display(), "root from git toplevel");
        return Ok(root);
    }

    find_marker_ancestor(cwd).ok_or_else(|| {
        ManagerError::Config(format!(
            "could not determine the project root from '{}'.\n\n\
             Run inside a git repository, create a '{}' directory at the project root,\n\
             or set {} to the project root.",
            cwd.display(),
            STATE_DIR,
            ROOT_ENV_VAR
        ))
    })
}

fn find_marker_ancestor(cwd: &Path) -> Option<PathBuf> {
    let start = absolute(cwd);
    start
        .ancestors()
        .find(|dir| ROOT_MARKERS.iter().any(|marker| dir.join(marker).exists()))
        .map(Path::to_path_buf)
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Lowercase a name and collapse every run of non-alphanumerics into `-`.
///
/// Used for session names and log file names so they stay shell- and
/// tmux-safe regardless of what an agent document declares.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Resolved paths and settings for one invocation.
///
/// All paths are absolute.
#[derive(Debug, Clone)]
pub struct ManagerContext {
    /// Absolute path to the project root.
    pub repo_root: PathBuf,

    /// Settings loaded from `.agent-manager/config.yaml` (or defaults).
    pub config: ManagerConfig,

    /// Directory scanned for agent documents.
    pub agents_dir: PathBuf,

    /// Directory receiving scheduled job logs.
    pub log_dir: PathBuf,

    /// The user's home directory, for user-global skill directories.
    pub home_dir: Option<PathBuf>,
}

impl ManagerContext {
    /// Resolve the root from the current directory and load settings.
    pub fn resolve() -> Result<Self> {
        let root = resolve_repo_root()?;
        Self::from_root(root)
    }

    /// Build a context for a known root, loading its settings file.
    pub fn from_root(repo_root: PathBuf) -> Result<Self> {
        let config = ManagerConfig::load(Self::config_path_for(&repo_root))?;
        Ok(Self::with_config(repo_root, config, dirs::home_dir()))
    }

    /// Build a context from explicit parts.
    pub fn with_config(
        repo_root: PathBuf,
        config: ManagerConfig,
        home_dir: Option<PathBuf>,
    ) -> Self {
        let agents_dir = repo_root.join(&config.agents_dir);
        let log_dir = repo_root.join(&config.log_dir);
        Self {
            repo_root,
            config,
            agents_dir,
            log_dir,
            home_dir,
        }
    }

    fn config_path_for(root: &Path) -> PathBuf {
        root.join(STATE_DIR).join("config.yaml")
    }

    /// Get the path to the settings file.
    pub fn config_path(&self) -> PathBuf {
        Self::config_path_for(&self.repo_root)
    }

    /// Skill directories in probe order; first match wins.
    ///
    /// Project-local primary, user-global primary, project-local secondary,
    /// user-global secondary.
    pub fn skill_search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::with_capacity(4);
        for base in [".agent", ".claude"] {
            dirs.push(self.repo_root.join(base).join("skills"));
            if let Some(home) = &self.home_dir {
                dirs.push(home.join(base).join("skills"));
            }
        }
        dirs
    }

    /// Expand `${REPO_ROOT}` and `${VAR}` tokens in a template string.
    ///
    /// `${REPO_ROOT}` always expands to the resolved root. Other variables come
    /// from the process environment; unknown ones are left verbatim.
    pub fn expand_template(&self, value: &str) -> String {
        expand_vars(value, |name| {
            if name == ROOT_ENV_VAR {
                Some(self.repo_root.to_string_lossy().to_string())
            } else {
                env::var(name).ok()
            }
        })
    }

    /// Expand a path template and anchor relative results at the root.
    pub fn resolve_path(&self, value: &str) -> PathBuf {
        let expanded = PathBuf::from(self.expand_template(value));
        if expanded.is_absolute() {
            expanded
        } else {
            self.repo_root.join(expanded)
        }
    }

    /// Deterministic tmux session name for an agent.
    pub fn session_name(&self, agent_name: &str) -> String {
        format!("{}{}", self.config.session_prefix, slug(agent_name))
    }

    /// Log file receiving the output of one scheduled job.
    pub fn job_log_path(&self, agent_name: &str, job_name: &str) -> PathBuf {
        self.log_dir
            .join(format!("{}-{}.log", slug(agent_name), slug(job_name)))
    }
}

/// Replace `${NAME}` tokens using `lookup`; unresolved tokens stay verbatim.
pub fn expand_vars<F>(value: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    TEMPLATE_VAR
        .replace_all(value, |caps: &regex::Captures<'_>| {
            lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{DirGuard, add_submodule, create_test_repo};
    use serial_test::serial;
    use tempfile::TempDir;

    fn canonical(path: &Path) -> PathBuf {
        path.canonicalize().unwrap()
    }

    #[test]
    fn test_env_override_wins() {
        let repo = create_test_repo();
        let other = TempDir::new().unwrap();

        let root = resolve_repo_root_from(
            repo.path(),
            Some(other.path().as_os_str().to_os_string()),
        )
        .unwrap();
        assert_eq!(canonical(&root), canonical(other.path()));
    }

    #[test]
    fn test_env_override_ignored_when_missing() {
        let repo = create_test_repo();
        let missing = repo.path().join("does-not-exist");

        let root =
            resolve_repo_root_from(repo.path(), Some(missing.into_os_string())).unwrap();
        assert_eq!(canonical(&root), canonical(repo.path()));
    }

    #[test]
    fn test_git_toplevel_from_subdirectory() {
        let repo = create_test_repo();
        let nested = repo.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let root = resolve_repo_root_from(&nested, None).unwrap();
        assert_eq!(canonical(&root), canonical(repo.path()));
    }

    #[test]
    fn test_superproject_wins_inside_vendored_checkout() {
        let project = create_test_repo();
        let tool = create_test_repo();
        add_submodule(project.path(), tool.path(), "vendor/agent-manager");
        let vendored = project.path().join("vendor").join("agent-manager");
        let nested = vendored.join("src");
        std::fs::create_dir_all(&nested).unwrap();

        let root = resolve_repo_root_from(&vendored, None).unwrap();
        assert_eq!(canonical(&root), canonical(project.path()));

        let root = resolve_repo_root_from(&nested, None).unwrap();
        assert_eq!(canonical(&root), canonical(project.path()));
    }

    #[test]
    fn test_marker_walk_without_git() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(STATE_DIR)).unwrap();
        let nested = dir.path().join("deep").join("er");
        std::fs::create_dir_all(&nested).unwrap();

        let root = resolve_repo_root_from(&nested, None).unwrap();
        assert_eq!(canonical(&root), canonical(dir.path()));
    }

    #[test]
    fn test_unresolvable_root_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = resolve_repo_root_from(dir.path(), None).unwrap_err();
        assert!(matches!(err, ManagerError::Config(_)));
        assert!(err.to_string().contains(ROOT_ENV_VAR));
    }

    #[test]
    #[serial]
    fn test_resolve_uses_process_env_and_cwd() {
        let repo = create_test_repo();
        let _guard = DirGuard::new(repo.path());

        // SAFETY: serialized test; no other thread reads the environment here.
        unsafe { env::remove_var(ROOT_ENV_VAR) };
        let root = resolve_repo_root().unwrap();
        assert_eq!(canonical(&root), canonical(repo.path()));

        let other = TempDir::new().unwrap();
        unsafe { env::set_var(ROOT_ENV_VAR, other.path()) };
        let root = resolve_repo_root().unwrap();
        unsafe { env::remove_var(ROOT_ENV_VAR) };
        assert_eq!(canonical(&root), canonical(other.path()));
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("alpha"), "alpha");
        assert_eq!(slug("Team Lead"), "team-lead");
        assert_eq!(slug("EMP_0001"), "emp-0001");
        assert_eq!(slug("  weird//name!! "), "weird-name");
    }

    #[test]
    fn test_expand_vars() {
        let lookup = |name: &str| match name {
            "HOME" => Some("/home/u".to_string()),
            _ => None,
        };
        assert_eq!(expand_vars("${HOME}/work", lookup), "/home/u/work");
        assert_eq!(expand_vars("${NOPE}/x", lookup), "${NOPE}/x");
        assert_eq!(expand_vars("plain", lookup), "plain");
    }

    #[test]
    fn test_expand_template_repo_root_anywhere() {
        let ctx = ManagerContext::with_config(
            PathBuf::from("/srv/project"),
            ManagerConfig::default(),
            None,
        );
        assert_eq!(
            ctx.expand_template("${REPO_ROOT}/bin/run --cwd ${REPO_ROOT}"),
            "/srv/project/bin/run --cwd /srv/project"
        );
    }

    #[test]
    fn test_resolve_path_anchors_relative_paths() {
        let ctx = ManagerContext::with_config(
            PathBuf::from("/srv/project"),
            ManagerConfig::default(),
            None,
        );
        assert_eq!(
            ctx.resolve_path("prompts/daily.md"),
            PathBuf::from("/srv/project/prompts/daily.md")
        );
        assert_eq!(ctx.resolve_path("/abs/file"), PathBuf::from("/abs/file"));
    }

    #[test]
    fn test_skill_search_dirs_order() {
        let ctx = ManagerContext::with_config(
            PathBuf::from("/p"),
            ManagerConfig::default(),
            Some(PathBuf::from("/home/u")),
        );
        assert_eq!(
            ctx.skill_search_dirs(),
            vec![
                PathBuf::from("/p/.agent/skills"),
                PathBuf::from("/home/u/.agent/skills"),
                PathBuf::from("/p/.claude/skills"),
                PathBuf::from("/home/u/.claude/skills"),
            ]
        );
    }

    #[test]
    fn test_session_and_log_names() {
        let ctx = ManagerContext::with_config(
            PathBuf::from("/p"),
            ManagerConfig::default(),
            None,
        );
        assert_eq!(ctx.session_name("Alpha Bot"), "agent-alpha-bot");
        assert_eq!(
            ctx.job_log_path("alpha", "daily standup"),
            PathBuf::from("/p/.crontab_logs/alpha-daily-standup.log")
        );
    }

    #[test]
    fn test_from_root_loads_settings() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(STATE_DIR)).unwrap();
        std::fs::write(
            dir.path().join(STATE_DIR).join("config.yaml"),
            "agents_dir: crew\n",
        )
        .unwrap();

        let ctx = ManagerContext::from_root(dir.path().to_path_buf()).unwrap();
        assert!(ctx.agents_dir.ends_with("crew"));
        assert!(ctx.config_path().ends_with("config.yaml"));
    }
}
