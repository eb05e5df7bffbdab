//! Agent definition documents and skills.
//!
//! An agent document is YAML frontmatter followed by free-form prose:
//!
//! ```text
//! ---
//! name: alpha
//! launcher: claude-code
//! launcher_args: ["--model", "opus"]
//! skills: [triage]
//! schedules:
//!   - name: daily
//!     cron: "0 9 * * 1-5"
//!     task: standup
//!     max_runtime: 30m
//! ---
//!
//! You are the alpha agent...
//! ```
//!
//! Documents live in the agents directory as `<stem>.md` or
//! `<stem>/AGENTS.md` and are looked up by their declared `name`, never by
//! file name. The prose is forwarded to the launched process untouched.

mod document;
mod fields;
mod loader;
mod skills;


pub use document::{AgentConfig, ScheduleEntry, parse_agent_document, split_frontmatter};
pub use fields::{format_duration, parse_duration, validate_cron};
pub use loader::{AgentListing, InvalidDocument, list_agents, load_agent, profile_paths};
pub use skills::{LoadedSkills, Skill, compose_system_context, load_skill, load_skills};
