//! Shape checks for schedule fields: cron expressions and runtime caps.
//!
//! Cron expressions are checked for shape only (five fields of cron
//! characters, or an `@` macro); cron itself remains the authority on
//! ranges and names.

use crate::error::{ManagerError, Result};
use regex::Regex;
use serde::Serializer;
use std::sync::LazyLock;
use std::time::Duration;

static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([smhd])$").expect("Invalid duration regex"));

static CRON_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z*/,\-]+$").expect("Invalid cron field regex"));

const CRON_MACROS: &[&str] = &[
    "@yearly",
    "@annually",
    "@monthly",
    "@weekly",
    "@daily",
    "@midnight",
    "@hourly",
    "@reboot",
];

/// Parse a duration of the form `<digits><s|m|h|d>`, e.g. `30m`.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    let caps = DURATION.captures(value).ok_or_else(|| {
        ManagerError::Validation(format!(
            "invalid duration '{}' (expected <number><s|m|h|d>, e.g. 30m)",
            value
        ))
    })?;

    let amount: u64 = caps[1].parse().map_err(|_| {
        ManagerError::Validation(format!("duration '{}' is out of range", value))
    })?;
    if amount == 0 {
        return Err(ManagerError::Validation(format!(
            "duration '{}' must be greater than zero",
            value
        )));
    }

    let unit = match &caps[2] {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => 24 * 60 * 60,
    };
    amount
        .checked_mul(unit)
        .map(Duration::from_secs)
        .ok_or_else(|| ManagerError::Validation(format!("duration '{}' is out of range", value)))
}

/// Render a duration in the largest unit that divides it exactly.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60)] {
        if secs > 0 && secs % size == 0 {
            return format!("{}{}", secs / size, unit);
        }
    }
    format!("{}s", secs)
}

/// Check that `expr` is a five-field cron expression or a cron macro.
pub fn validate_cron(expr: &str) -> Result<()> {
    let expr = expr.trim();
    if expr.starts_with('@') {
        if CRON_MACROS.contains(&expr) {
            return Ok(());
        }
        return Err(ManagerError::Validation(format!(
            "unknown cron macro '{}' (expected one of {})",
            expr,
            CRON_MACROS.join(", ")
        )));
    }

    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(ManagerError::Validation(format!(
            "cron expression '{}' must have 5 fields, found {}",
            expr,
            fields.len()
        )));
    }
    if let Some(bad) = fields.iter().find(|f| !CRON_FIELD.is_match(f)) {
        return Err(ManagerError::Validation(format!(
            "cron expression '{}' has an invalid field '{}'",
            expr, bad
        )));
    }
    Ok(())
}

pub(crate) fn serialize_duration<S: Serializer>(
    value: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_some(&format_duration(*d)),
        None => serializer.serialize_none(),
    }
}
