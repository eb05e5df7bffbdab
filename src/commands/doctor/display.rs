//! Display and reporting functions for the doctor command.

use super::{DoctorReport, IssueSeverity};

/// Render the doctor report.
pub fn format_report(report: &DoctorReport) -> String {
    let mut out = String::new();

    for passed in &report.passed {
        out.push_str(&format!("  ok  {}\n", passed));
    }
    if !report.passed.is_empty() {
        out.push('\n');
    }

    if !report.has_issues() {
        out.push_str("No issues detected.\n");
        return out;
    }

    out.push_str(&format!("Issues detected ({}):\n\n", report.issues.len()));
    for (i, issue) in report.issues.iter().enumerate() {
        out.push_str(&format!(
            "  {}. [{}] {} - {}\n",
            i + 1,
            issue.severity,
            issue.category,
            issue.description
        ));

        if let Some(path) = &issue.path {
            out.push_str(&format!("     Path: {}\n", path));
        }

        if let Some(remediation) = &issue.remediation {
            let mut lines = remediation.lines();
            if let Some(first) = lines.next() {
                out.push_str(&format!("     Fix:  {}\n", first));
            }
            for line in lines {
                out.push_str(&format!("           {}\n", line));
            }
        }
        out.push('\n');
    }

    let error_count = report.error_count();
    let warning_count = report
        .issues
        .iter()
        .filter(|i| i.severity == IssueSeverity::Warning)
        .count();
    out.push_str(&format!(
        "Summary: {} errors, {} warnings.\n",
        error_count, warning_count
    ));
    out
}
