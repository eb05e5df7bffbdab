//! Agents directory scanning and lookup by declared name.

use super::document::{AgentConfig, declared_name, parse_agent_document};
use crate::context::ManagerContext;
use crate::error::{ManagerError, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of a folder-style agent profile.
const FOLDER_PROFILE: &str = "AGENTS.md";

/// A document in the agents directory that could not be used.
#[derive(Debug, Clone)]
pub struct InvalidDocument {
    pub path: PathBuf,
    pub reason: String,
}

/// Every usable agent plus the documents that were skipped.
#[derive(Debug, Default)]
pub struct AgentListing {
    /// Sorted by name.
    pub agents: Vec<AgentConfig>,
    pub invalid: Vec<InvalidDocument>,
}

/// Candidate agent documents in `agents_dir`, sorted by stem.
///
/// `<stem>.md` files and `<stem>/AGENTS.md` folders are both accepted; the
/// folder wins when both exist. A missing directory yields no candidates.
pub fn profile_paths(agents_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(agents_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(ManagerError::Config(format!(
                "failed to read agents directory '{}': {}",
                agents_dir.display(),
                e
            )));
        }
    };

    let mut files = BTreeMap::new();
    let mut folders = BTreeMap::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };

        if path.is_dir() {
            let profile = path.join(FOLDER_PROFILE);
            if profile.is_file() {
                folders.insert(stem, profile);
            }
        } else if path.extension().and_then(|e| e.to_str()) == Some("md")
            && !stem.eq_ignore_ascii_case("readme")
        {
            files.insert(stem, path);
        }
    }

    files.extend(folders);
    Ok(files.into_values().collect())
}

/// Load the agent whose declared `name` matches.
///
/// Unparsable documents are skipped with a warning unless they declare the
/// requested name, in which case their validation error is returned. A
/// document whose session or log names collide with an earlier one is
/// rejected the same way [`list_agents`] rejects it.
pub fn load_agent(ctx: &ManagerContext, name: &str) -> Result<AgentConfig> {
    if !ctx.agents_dir.is_dir() {
        return Err(ManagerError::NotFound(format!(
            "agent '{}' not found: agents directory '{}' does not exist",
            name,
            ctx.agents_dir.display()
        )));
    }

    let mut claims = NameClaims::default();
    for path in profile_paths(&ctx.agents_dir)? {
        let content = match read_document(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("skipping {}", e);
                continue;
            }
        };

        match parse_agent_document(&content, &path) {
            Ok(agent) => {
                let conflict = claims.conflict(ctx, &agent);
                if agent.name == name {
                    if let Some(reason) = conflict {
                        return Err(ManagerError::Validation(format!(
                            "'{}': {}",
                            path.display(),
                            reason
                        )));
                    }
                    debug!(agent = name, path = %path.display(), "loaded agent");
                    return Ok(agent);
                }
                if conflict.is_none() {
                    claims.claim(ctx, &agent, &path);
                }
            }
            Err(e) => {
                if declared_name(&content).as_deref() == Some(name) {
                    return Err(e);
                }
                warn!("skipping invalid agent document: {}", e);
            }
        }
    }

    Err(ManagerError::NotFound(format!(
        "agent '{}' not found in '{}'",
        name,
        ctx.agents_dir.display()
    )))
}

/// Load every usable agent in the agents directory.
///
/// Documents are taken in path order. One that repeats an earlier name, or
/// whose session or job log names collide with an earlier agent's, is
/// reported as invalid.
pub fn list_agents(ctx: &ManagerContext) -> Result<AgentListing> {
    let mut listing = AgentListing::default();
    let mut claims = NameClaims::default();

    for path in profile_paths(&ctx.agents_dir)? {
        let parsed = read_document(&path).and_then(|c| parse_agent_document(&c, &path));
        match parsed {
            Ok(agent) => {
                if let Some(reason) = claims.conflict(ctx, &agent) {
                    warn!(path = %path.display(), "skipping agent: {}", reason);
                    listing.invalid.push(InvalidDocument { path, reason });
                    continue;
                }
                claims.claim(ctx, &agent, &path);
                listing.agents.push(agent);
            }
            Err(e) => {
                warn!("skipping invalid agent document: {}", e);
                listing.invalid.push(InvalidDocument {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    listing.agents.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(listing)
}

// ============================================================================
// Name collisions
// ============================================================================

/// Session and job log names taken by the agents accepted so far.
#[derive(Default)]
struct NameClaims {
    /// Session name to (agent name, document).
    sessions: HashMap<String, (String, PathBuf)>,
    /// Job log file to `agent/job`.
    logs: HashMap<PathBuf, String>,
}

impl NameClaims {
    fn conflict(&self, ctx: &ManagerContext, agent: &AgentConfig) -> Option<String> {
        let session = ctx.session_name(&agent.name);
        if let Some((owner, path)) = self.sessions.get(&session) {
            return Some(if *owner == agent.name {
                format!(
                    "duplicate agent name '{}' (already declared in '{}')",
                    agent.name,
                    path.display()
                )
            } else {
                format!(
                    "agent name '{}' maps to session '{}', already used by '{}' in '{}'",
                    agent.name,
                    session,
                    owner,
                    path.display()
                )
            });
        }

        agent.schedules.iter().find_map(|entry| {
            let log = ctx.job_log_path(&agent.name, &entry.name);
            self.logs.get(&log).map(|owner| {
                format!(
                    "schedule '{}/{}' would share log file '{}' with '{}'",
                    agent.name,
                    entry.name,
                    log.display(),
                    owner
                )
            })
        })
    }

    fn claim(&mut self, ctx: &ManagerContext, agent: &AgentConfig, path: &Path) {
        self.sessions.insert(
            ctx.session_name(&agent.name),
            (agent.name.clone(), path.to_path_buf()),
        );
        for entry in &agent.schedules {
            self.logs.insert(
                ctx.job_log_path(&agent.name, &entry.name),
                format!("{}/{}", agent.name, entry.name),
            );
        }
    }
}

fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        ManagerError::Config(format!(
            "failed to read agent document '{}': {}",
            path.display(),
            e
        ))
    })
}
