//! Skill documents and system-context composition.
//!
//! A skill is `<skills dir>/<name>/SKILL.md`, optionally with frontmatter
//! carrying `name` and `description`. Skills are best-effort: anything that
//! prevents one from loading is a warning, never a failed start.

use super::document::{AgentConfig, split_frontmatter};
use crate::context::ManagerContext;
use crate::error::{ManagerError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SKILL_FILE: &str = "SKILL.md";
const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// A loaded skill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skill {
    /// Name the skill was requested by.
    pub name: String,
    pub description: String,
    pub body: String,
    pub path: PathBuf,
}

/// Outcome of loading an agent's declared skills.
#[derive(Debug, Default)]
pub struct LoadedSkills {
    /// In declaration order.
    pub skills: Vec<Skill>,
    /// Names that could not be loaded.
    pub missing: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SkillMeta {
    description: Option<String>,
}

/// Find and read a skill; the first search directory that has it wins.
pub fn load_skill(ctx: &ManagerContext, name: &str) -> Result<Skill> {
    if !is_plain_name(name) {
        return Err(ManagerError::SkillNotFound(name.to_string()));
    }

    for dir in ctx.skill_search_dirs() {
        let path = dir.join(name).join(SKILL_FILE);
        if path.is_file() {
            debug!(skill = name, path = %path.display(), "found skill");
            return read_skill(name, &path);
        }
    }
    Err(ManagerError::SkillNotFound(name.to_string()))
}

/// Load every named skill, warning about and skipping the ones that fail.
pub fn load_skills(ctx: &ManagerContext, names: &[String]) -> LoadedSkills {
    let mut loaded = LoadedSkills::default();
    for name in names {
        match load_skill(ctx, name) {
            Ok(skill) => loaded.skills.push(skill),
            Err(e) => {
                warn!(skill = %name, "{}", e);
                loaded.missing.push(name.clone());
            }
        }
    }
    loaded
}

/// Build the first input sent to a freshly started agent.
///
/// The prose becomes a `# <NAME> ROLE` section and the skills an
/// `## Skills` section, joined by a horizontal rule. Empty when the agent
/// has neither.
pub fn compose_system_context(agent: &AgentConfig, skills: &[Skill]) -> String {
    let mut sections = Vec::new();

    let prompt = agent.prompt.trim();
    if !prompt.is_empty() {
        sections.push(format!("# {} ROLE\n\n{}", agent.name.to_uppercase(), prompt));
    }

    if !skills.is_empty() {
        let mut section = String::from("## Skills");
        for skill in skills {
            section.push_str(&format!("\n\n### {}\n\n{}", skill.name, skill.body.trim()));
        }
        sections.push(section);
    }

    sections.join(SECTION_SEPARATOR)
}

fn read_skill(name: &str, path: &Path) -> Result<Skill> {
    let content = fs::read_to_string(path).map_err(|e| {
        ManagerError::Config(format!("failed to read skill '{}': {}", path.display(), e))
    })?;

    let (description, body) = match split_frontmatter(&content) {
        Some((yaml, body)) => {
            let meta: SkillMeta = if yaml.trim().is_empty() {
                SkillMeta::default()
            } else {
                serde_yaml::from_str(&yaml).map_err(|e| {
                    ManagerError::Validation(format!(
                        "'{}': invalid skill frontmatter: {}",
                        path.display(),
                        e
                    ))
                })?
            };
            (meta.description.unwrap_or_default(), body)
        }
        None => (String::new(), content),
    };

    Ok(Skill {
        name: name.to_string(),
        description: description.trim().to_string(),
        body: body.trim().to_string(),
        path: path.to_path_buf(),
    })
}

// Skill names become path components.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
