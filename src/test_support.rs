use crate::config::ManagerConfig;
use crate::context::{ManagerContext, STATE_DIR};
use crate::error::{ManagerError, Result};
use crate::launcher::{GENERIC, LauncherRegistry, ResolvedLauncher, infer_provider};
use crate::schedule::CrontabStore;
use crate::session::{CreateOutcome, Multiplexer, SessionTiming};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{LazyLock, Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;

static CWD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub(crate) struct DirGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl DirGuard {
    pub(crate) fn new(new_dir: &Path) -> Self {
        // Changing the process current working directory is global and not thread-safe.
        // Lock it so tests don't race even if a #[serial] annotation is missed.
        let lock = CWD_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(new_dir).unwrap();
        Self {
            original,
            _lock: lock,
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

pub(crate) fn create_test_repo() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();

    git(path, &["init"]);
    git(path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(path, &["config", "user.email", "test@example.com"]);
    git(path, &["config", "user.name", "Test User"]);

    std::fs::write(path.join("README.md"), "# Test\n").unwrap();
    git(path, &["add", "."]);
    git(path, &["commit", "-m", "Initial commit"]);

    temp_dir
}

/// Vendor the repository at `source` into `repo_dir` as a submodule at `dest`.
pub(crate) fn add_submodule(repo_dir: &Path, source: &Path, dest: &str) {
    let source = source.to_string_lossy();
    git(
        repo_dir,
        &["-c", "protocol.file.allow=always", "submodule", "add", &source, dest],
    );
}

fn git(repo_dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(repo_dir)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute git {}: {}", args.join(" "), e));

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "git {} failed (exit code {:?})\nstdout:\n{}\nstderr:\n{}",
            args.join(" "),
            output.status.code(),
            stdout,
            stderr
        );
    }
}

// ============================================================================
// Project fixtures
// ============================================================================

/// A throwaway project root with an agents directory and an isolated home.
pub(crate) struct TestProject {
    pub dir: TempDir,
    pub ctx: ManagerContext,
}

impl TestProject {
    pub(crate) fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(STATE_DIR)).unwrap();
        std::fs::create_dir_all(dir.path().join("agents")).unwrap();
        let home = dir.path().join("home");
        std::fs::create_dir_all(&home).unwrap();

        let root = dir.path().canonicalize().unwrap();
        let ctx = ManagerContext::with_config(root, ManagerConfig::default(), Some(home));
        Self { dir, ctx }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.ctx.repo_root
    }

    /// Write `agents/<stem>.md`.
    pub(crate) fn write_agent(&self, stem: &str, content: &str) -> PathBuf {
        let path = self.ctx.agents_dir.join(format!("{}.md", stem));
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Write `<root>/.agent/skills/<name>/SKILL.md`.
    pub(crate) fn write_skill(&self, name: &str, content: &str) -> PathBuf {
        let dir = self.root().join(".agent").join("skills").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("SKILL.md");
        std::fs::write(&path, content).unwrap();
        path
    }
}

/// Minimal agent document.
pub(crate) fn agent_doc(name: &str, extra_yaml: &str, body: &str) -> String {
    format!(
        "---\nname: {}\nlauncher: ./bin/agent\n{}---\n{}",
        name, extra_yaml, body
    )
}

/// Timing with no sleeps worth mentioning.
pub(crate) fn fast_timing() -> SessionTiming {
    SessionTiming {
        poll_interval: Duration::from_millis(1),
        startup_wait: Duration::ZERO,
        ready_timeout: Duration::from_millis(20),
        provider_startup_waits: false,
    }
}

/// Resolves every launcher as a path, without touching `PATH`.
pub(crate) struct StaticLaunchers;

impl LauncherRegistry for StaticLaunchers {
    fn resolve(&self, launcher: &str) -> Result<ResolvedLauncher> {
        if launcher.trim().is_empty() {
            return Err(ManagerError::Validation("launcher is empty".to_string()));
        }
        let provider = if launcher.contains('/') {
            infer_provider(launcher)
        } else {
            &GENERIC
        };
        Ok(ResolvedLauncher {
            program: launcher.to_string(),
            provider,
        })
    }
}

// ============================================================================
// Fake multiplexer
// ============================================================================

/// One call made against [`FakeMultiplexer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MuxOp {
    Create {
        name: String,
        working_dir: PathBuf,
        command: Vec<String>,
    },
    SendLiteral(String, String),
    Paste(String, String),
    SendEnter(String),
    Kill(String),
}

#[derive(Default)]
struct FakeState {
    sessions: Vec<String>,
    ops: Vec<MuxOp>,
    /// Screens shown by captures; the front is popped until one remains.
    screens: BTreeMap<String, VecDeque<String>>,
    /// Remove the session after this many captures.
    exit_after: BTreeMap<String, usize>,
    captures: BTreeMap<String, usize>,
    /// Names for which `create_session` reports a collision.
    collide_on_create: Vec<String>,
}

/// In-memory multiplexer recording every mutating call.
///
/// Sessions show a generic `$` prompt unless screens are scripted.
#[derive(Default)]
pub(crate) struct FakeMultiplexer {
    state: RefCell<FakeState>,
}

impl FakeMultiplexer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Pretend a session already exists.
    pub(crate) fn add_session(&self, name: &str) {
        self.state.borrow_mut().sessions.push(name.to_string());
    }

    /// Screens returned by successive captures of `name`.
    pub(crate) fn script_screens(&self, name: &str, screens: &[&str]) {
        self.state.borrow_mut().screens.insert(
            name.to_string(),
            screens.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Make `name` vanish after `captures` captures.
    pub(crate) fn exit_after(&self, name: &str, captures: usize) {
        self.state
            .borrow_mut()
            .exit_after
            .insert(name.to_string(), captures);
    }

    /// Simulate a concurrent starter creating `name` between pre-check and create.
    pub(crate) fn collide_on_create(&self, name: &str) {
        self.state
            .borrow_mut()
            .collide_on_create
            .push(name.to_string());
    }

    pub(crate) fn ops(&self) -> Vec<MuxOp> {
        self.state.borrow().ops.clone()
    }

    pub(crate) fn session_names(&self) -> Vec<String> {
        self.state.borrow().sessions.clone()
    }

    fn exists(&self, name: &str) -> bool {
        self.state.borrow().sessions.iter().any(|s| s == name)
    }

    fn record(&self, op: MuxOp) {
        self.state.borrow_mut().ops.push(op);
    }

    fn require(&self, name: &str) -> Result<()> {
        if self.exists(name) {
            Ok(())
        } else {
            Err(ManagerError::ExternalCommand(format!(
                "can't find session: {}",
                name
            )))
        }
    }
}

impl Multiplexer for FakeMultiplexer {
    fn has_session(&self, name: &str) -> Result<bool> {
        Ok(self.exists(name))
    }

    fn list_sessions(&self) -> Result<Vec<String>> {
        Ok(self.session_names())
    }

    fn create_session(
        &self,
        name: &str,
        working_dir: &Path,
        command: &[String],
    ) -> Result<CreateOutcome> {
        let mut state = self.state.borrow_mut();
        if let Some(pos) = state.collide_on_create.iter().position(|n| n == name) {
            state.collide_on_create.remove(pos);
            state.sessions.push(name.to_string());
            return Ok(CreateOutcome::NameTaken);
        }
        if state.sessions.iter().any(|s| s == name) {
            return Ok(CreateOutcome::NameTaken);
        }
        state.sessions.push(name.to_string());
        state.ops.push(MuxOp::Create {
            name: name.to_string(),
            working_dir: working_dir.to_path_buf(),
            command: command.to_vec(),
        });
        Ok(CreateOutcome::Created)
    }

    fn capture(&self, name: &str, lines: usize) -> Result<Option<String>> {
        let mut state = self.state.borrow_mut();
        if !state.sessions.iter().any(|s| s == name) {
            return Ok(None);
        }

        let screen = match state.screens.get_mut(name) {
            Some(screens) if screens.len() > 1 => screens.pop_front().unwrap_or_default(),
            Some(screens) => screens.front().cloned().unwrap_or_default(),
            None => "$".to_string(),
        };

        let count = state.captures.entry(name.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        if state.exit_after.get(name).is_some_and(|&limit| count >= limit) {
            state.sessions.retain(|s| s != name);
        }

        let all: Vec<&str> = screen.lines().collect();
        let start = all.len().saturating_sub(lines);
        Ok(Some(all[start..].join("\n")))
    }

    fn send_literal(&self, name: &str, text: &str) -> Result<()> {
        self.require(name)?;
        self.record(MuxOp::SendLiteral(name.to_string(), text.to_string()));
        Ok(())
    }

    fn paste(&self, name: &str, text: &str) -> Result<()> {
        self.require(name)?;
        self.record(MuxOp::Paste(name.to_string(), text.to_string()));
        Ok(())
    }

    fn send_enter(&self, name: &str) -> Result<()> {
        self.require(name)?;
        self.record(MuxOp::SendEnter(name.to_string()));
        Ok(())
    }

    fn kill_session(&self, name: &str) -> Result<bool> {
        let removed = self.exists(name);
        if removed {
            self.state.borrow_mut().sessions.retain(|s| s != name);
            self.record(MuxOp::Kill(name.to_string()));
        }
        Ok(removed)
    }
}

// ============================================================================
// In-memory crontab
// ============================================================================

/// Crontab held in memory, counting writes.
#[derive(Default)]
pub(crate) struct MemoryCrontab {
    content: RefCell<String>,
    writes: Cell<usize>,
}

impl MemoryCrontab {
    pub(crate) fn with(content: &str) -> Self {
        Self {
            content: RefCell::new(content.to_string()),
            writes: Cell::new(0),
        }
    }

    pub(crate) fn content(&self) -> String {
        self.content.borrow().clone()
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.get()
    }
}

impl CrontabStore for MemoryCrontab {
    fn read(&self) -> Result<String> {
        Ok(self.content())
    }

    fn write(&self, content: &str) -> Result<()> {
        *self.content.borrow_mut() = content.to_string();
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
