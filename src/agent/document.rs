//! Agent document parsing and validation.
//!
//! Frontmatter is first deserialized into raw records where every field is
//! optional, then checked against the required/optional field table below
//! and converted into [`AgentConfig`]. Wrong YAML types are rejected by
//! serde; missing or empty required fields by [`validate`].
//!
//! | field               | required | default        |
//! |---------------------|----------|----------------|
//! | `name`              | yes      |                |
//! | `launcher`          | yes      |                |
//! | `description`       | no       | empty          |
//! | `enabled`           | no       | `true`         |
//! | `working_directory` | no       | project root   |
//! | `launcher_args`     | no       | empty          |
//! | `skills`            | no       | empty          |
//! | `schedules`         | no       | empty          |

use super::fields::{parse_duration, serialize_duration, validate_cron};
use crate::context::slug;
use crate::error::{ManagerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A validated agent definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentConfig {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    /// Template string; `None` means the project root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    /// Path or symbolic provider name.
    pub launcher: String,
    pub launcher_args: Vec<String>,
    pub skills: Vec<String>,
    pub schedules: Vec<ScheduleEntry>,

    /// Prose body, forwarded verbatim as initial context.
    #[serde(skip)]
    pub prompt: String,

    /// Document the record was loaded from.
    pub source: PathBuf,
}

/// A recurring task bound to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    pub name: String,
    pub cron: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_file: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_duration"
    )]
    pub max_runtime: Option<Duration>,
    pub enabled: bool,
}

impl AgentConfig {
    /// Find a schedule entry by name.
    pub fn schedule(&self, name: &str) -> Option<&ScheduleEntry> {
        self.schedules.iter().find(|s| s.name == name)
    }
}

// ============================================================================
// Raw records
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAgent {
    name: Option<String>,
    description: Option<String>,
    enabled: Option<bool>,
    working_directory: Option<String>,
    launcher: Option<String>,
    launcher_args: Option<Vec<String>>,
    skills: Option<Vec<String>>,
    schedules: Option<Vec<RawSchedule>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSchedule {
    name: Option<String>,
    cron: Option<String>,
    task: Option<String>,
    task_file: Option<String>,
    max_runtime: Option<String>,
    enabled: Option<bool>,
}

// ============================================================================
// Parsing
// ============================================================================

/// Split a document into its frontmatter YAML and prose body.
///
/// The first line must be `---` and a later line must close the block with
/// `---`. Returns `None` when either delimiter is missing. CRLF line endings
/// are normalized.
pub fn split_frontmatter(content: &str) -> Option<(String, String)> {
    let normalized = content.replace("\r\n", "\n");
    let text = normalized.strip_prefix('\u{feff}').unwrap_or(&normalized);

    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != "---" {
        return None;
    }

    let mut yaml = String::new();
    for line in lines.by_ref() {
        if line.trim_end() == "---" {
            let body: String = lines.collect();
            return Some((yaml, body));
        }
        yaml.push_str(line);
    }
    None
}

/// Parse and validate an agent document.
///
/// `source` is recorded on the result and used in error messages.
pub fn parse_agent_document(content: &str, source: &Path) -> Result<AgentConfig> {
    let (yaml, body) = split_frontmatter(content).ok_or_else(|| {
        ManagerError::Validation(format!(
            "'{}': missing '---' delimited frontmatter block",
            source.display()
        ))
    })?;

    let raw: RawAgent = if yaml.trim().is_empty() {
        RawAgent::default()
    } else {
        serde_yaml::from_str(&yaml).map_err(|e| {
            ManagerError::Validation(format!(
                "'{}': invalid frontmatter: {}",
                source.display(),
                e
            ))
        })?
    };

    validate(raw, body.trim().to_string(), source)
}

/// Read the declared `name` without validating anything else.
///
/// Lets the loader tell whether a broken document was the one requested.
pub(crate) fn declared_name(content: &str) -> Option<String> {
    let (yaml, _) = split_frontmatter(content)?;
    let value: serde_yaml::Value = serde_yaml::from_str(&yaml).ok()?;
    value
        .get("name")
        .and_then(|n| n.as_str())
        .map(|n| n.trim().to_string())
}

fn validate(raw: RawAgent, prompt: String, source: &Path) -> Result<AgentConfig> {
    let fail = |msg: String| ManagerError::Validation(format!("'{}': {}", source.display(), msg));

    let name = required(raw.name, "name").map_err(fail)?;
    addressable(&name).map_err(fail)?;
    let launcher = required(raw.launcher, "launcher").map_err(fail)?;

    let skills = raw.skills.unwrap_or_default();
    if let Some(i) = skills.iter().position(|s| s.trim().is_empty()) {
        return Err(fail(format!("skills[{}] is empty", i)));
    }
    let skills = skills.into_iter().map(|s| s.trim().to_string()).collect();

    let mut schedules = Vec::new();
    let mut seen = HashMap::new();
    for (i, entry) in raw.schedules.unwrap_or_default().into_iter().enumerate() {
        let entry = validate_schedule(entry)
            .map_err(|msg| fail(format!("schedules[{}]: {}", i, msg)))?;
        if let Some(earlier) = seen.insert(slug(&entry.name), entry.name.clone()) {
            return Err(fail(if earlier == entry.name {
                format!("duplicate schedule name '{}'", entry.name)
            } else {
                format!(
                    "schedule name '{}' collides with '{}' (same log file name)",
                    entry.name, earlier
                )
            }));
        }
        schedules.push(entry);
    }

    Ok(AgentConfig {
        name,
        description: raw.description.unwrap_or_default().trim().to_string(),
        enabled: raw.enabled.unwrap_or(true),
        working_directory: non_empty(raw.working_directory),
        launcher,
        launcher_args: raw.launcher_args.unwrap_or_default(),
        skills,
        schedules,
        prompt,
        source: source.to_path_buf(),
    })
}

fn validate_schedule(raw: RawSchedule) -> std::result::Result<ScheduleEntry, String> {
    let name = required(raw.name, "name")?;
    addressable(&name)?;
    let cron = required(raw.cron, "cron")?;
    validate_cron(&cron).map_err(|e| format!("'{}': {}", name, inner(e)))?;

    let max_runtime = match non_empty(raw.max_runtime) {
        Some(value) => Some(
            parse_duration(&value).map_err(|e| format!("'{}': max_runtime: {}", name, inner(e)))?,
        ),
        None => None,
    };

    let task = non_empty(raw.task);
    let task_file = non_empty(raw.task_file);
    if task.is_some() && task_file.is_some() {
        return Err(format!(
            "'{}': set either 'task' or 'task_file', not both",
            name
        ));
    }

    Ok(ScheduleEntry {
        name,
        cron,
        task,
        task_file,
        max_runtime,
        enabled: raw.enabled.unwrap_or(true),
    })
}

fn required(value: Option<String>, field: &str) -> std::result::Result<String, String> {
    match non_empty(value) {
        Some(v) => Ok(v),
        None => Err(format!("missing required field '{}'", field)),
    }
}

/// Session and log names are derived from the slug, so it must not be empty.
fn addressable(name: &str) -> std::result::Result<(), String> {
    if slug(name).is_empty() {
        Err(format!(
            "name '{}' needs at least one ASCII letter or digit",
            name
        ))
    } else {
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn inner(err: ManagerError) -> String {
    match err {
        ManagerError::Validation(msg) => msg,
        other => other.to_string(),
    }
}
