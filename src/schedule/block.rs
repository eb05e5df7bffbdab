//! The managed crontab block: rendering and splicing.
//!
//! The block is regenerated wholesale on every sync. Everything outside the
//! sentinel lines belongs to someone else and is preserved byte-for-byte.

use super::Job;
use crate::context::slug;
use crate::error::{ManagerError, Result};
use regex::Regex;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const START_SENTINEL: &str = "# >>> agent-manager schedules (auto-generated, do not edit) >>>";
pub const END_SENTINEL: &str = "# <<< agent-manager schedules <<<";

static ENV_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*=").expect("Invalid environment assignment regex")
});

/// Paths baked into every rendered cron line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    pub root: PathBuf,
    pub log_dir: PathBuf,
    /// Absolute path of the agent-manager executable.
    pub exe: PathBuf,
    /// `PATH` given to each job command, already expanded.
    pub cron_path: String,
}

impl BlockLayout {
    pub fn log_file(&self, agent: &str, job: &str) -> PathBuf {
        self.log_dir
            .join(format!("{}-{}.log", slug(agent), slug(job)))
    }
}

/// Render the managed block for `jobs`, or `None` when there are none.
///
/// Jobs are ordered by agent then schedule name, so the output depends only
/// on the set of jobs, never on the order they were collected in.
pub fn render_block(jobs: &[Job], layout: &BlockLayout) -> Option<String> {
    if jobs.is_empty() {
        return None;
    }

    let mut sorted: Vec<&Job> = jobs.iter().collect();
    sorted.sort_by(|a, b| {
        (a.agent.as_str(), a.entry.name.as_str()).cmp(&(b.agent.as_str(), b.entry.name.as_str()))
    });

    let mut lines = vec![START_SENTINEL.to_string()];
    for job in sorted {
        lines.push(format!("# {}/{}", job.agent, job.entry.name));
        lines.push(render_line(job, layout));
    }
    lines.push(END_SENTINEL.to_string());
    Some(lines.join("\n"))
}

fn render_line(job: &Job, layout: &BlockLayout) -> String {
    // PATH stays scoped to this command so crontab lines outside the block
    // keep their own environment.
    let command = format!(
        "cd {} && mkdir -p {} && PATH={} {} schedule run {} --job {} >> {} 2>&1",
        quote_path(&layout.root),
        quote_path(&layout.log_dir),
        quote(&layout.cron_path),
        quote_path(&layout.exe),
        quote(&job.agent),
        quote(&job.entry.name),
        quote_path(&layout.log_file(&job.agent, &job.entry.name)),
    );
    // cron turns an unescaped % into a newline.
    format!("{} {}", job.entry.cron.trim(), command.replace('%', "\\%"))
}

fn quote(value: &str) -> Cow<'_, str> {
    shell_words::quote(value)
}

fn quote_path(path: &Path) -> String {
    shell_words::quote(&path.to_string_lossy()).into_owned()
}

/// Positions of the sentinel lines in `lines`.
fn find_sentinels(lines: &[&str]) -> (Vec<usize>, Vec<usize>) {
    let mut starts = Vec::new();
    let mut ends = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let line = line.trim_end();
        if line == START_SENTINEL {
            starts.push(i);
        } else if line == END_SENTINEL {
            ends.push(i);
        }
    }
    (starts, ends)
}

/// Located managed block, as line indices of its sentinels.
fn locate(lines: &[&str]) -> Result<Option<(usize, usize)>> {
    let (starts, ends) = find_sentinels(lines);
    match (starts.as_slice(), ends.as_slice()) {
        ([], []) => Ok(None),
        ([start], [end]) if start < end => Ok(Some((*start, *end))),
        ([start], [end]) => Err(ManagerError::CorruptManagedBlock(format!(
            "end sentinel (line {}) appears before start sentinel (line {})",
            end + 1,
            start + 1
        ))),
        _ => Err(ManagerError::CorruptManagedBlock(format!(
            "expected one start and one end sentinel, found {} and {}; \
             fix the crontab by hand (crontab -e) and sync again",
            starts.len(),
            ends.len()
        ))),
    }
}

/// Replace, insert, or remove the managed block in `current`.
///
/// With no existing block, `block` is appended after a blank separator line.
/// With exactly one well-ordered block, it is replaced in place. `None`
/// removes the block. Any other sentinel arrangement is an error and
/// nothing is changed.
pub fn splice_block(current: &str, block: Option<&str>) -> Result<String> {
    let lines: Vec<&str> = current.split_inclusive('\n').collect();

    let Some((start, end)) = locate(&lines)? else {
        let Some(block) = block else {
            return Ok(current.to_string());
        };
        let mut out = current.to_string();
        if !out.is_empty() {
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str(block);
        out.push('\n');
        return Ok(out);
    };

    let mut before: Vec<&str> = lines[..start].to_vec();
    let after = &lines[end + 1..];
    let mut out = String::with_capacity(current.len());
    match block {
        Some(block) => {
            out.extend(before);
            out.push_str(block);
            out.push('\n');
        }
        None => {
            // Drop the separator that was added with the block.
            if after.is_empty() && before.last().is_some_and(|l| l.trim().is_empty()) {
                before.pop();
            }
            out.extend(before);
        }
    }
    out.extend(after.iter().copied());
    Ok(out)
}

/// Text of the managed block in `crontab`, sentinels included.
pub fn managed_block(crontab: &str) -> Result<Option<String>> {
    let lines: Vec<&str> = crontab.lines().collect();
    Ok(locate(&lines)?.map(|(start, end)| lines[start..=end].join("\n")))
}

/// Number of cron entries inside the managed block of `crontab`.
///
/// Comments, blank lines and environment assignments are not entries. A
/// missing or corrupt block counts as zero.
pub fn managed_entry_count(crontab: &str) -> usize {
    let lines: Vec<&str> = crontab.lines().collect();
    match locate(&lines) {
        Ok(Some((start, end))) => count_entries(&lines[start + 1..end]),
        _ => 0,
    }
}

fn count_entries(lines: &[&str]) -> usize {
    lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !ENV_ASSIGNMENT.is_match(l))
        .count()
}
