//! Markdown report rendering.

use std::fmt::Write;

use crate::domain::job::JobId;
use crate::domain::scan::{FindingSeverity, ScanOutput};

pub fn render_markdown(job_id: &JobId, output: &ScanOutput) -> String {
    let summary = output.summary();
    let mut md = String::new();

    let _ = writeln!(md, "# Code Review Report");
    let _ = writeln!(md);
    let _ = writeln!(md, "- Job: `{}`", job_id);
    let _ = writeln!(md, "- Files scanned: {}", summary.files_scanned);
    let _ = writeln!(md, "- Findings: {}", summary.findings_total);
    let _ = writeln!(md);

    let _ = writeln!(md, "## Severity Breakdown");
    let _ = writeln!(md);
    let _ = writeln!(md, "| Severity | Count |");
    let _ = writeln!(md, "|----------|-------|");
    let _ = writeln!(md, "| Critical | {} |", summary.by_severity.critical);
    let _ = writeln!(md, "| High | {} |", summary.by_severity.high);
    let _ = writeln!(md, "| Medium | {} |", summary.by_severity.medium);
    let _ = writeln!(md, "| Low | {} |", summary.by_severity.low);
    let _ = writeln!(md, "| Info | {} |", summary.by_severity.info);
    let _ = writeln!(md);

    if !summary.hotspots.is_empty() {
        let _ = writeln!(md, "## Hotspots");
        let _ = writeln!(md);
        for path in &summary.hotspots {
            let _ = writeln!(md, "- `{}`", path);
        }
        let _ = writeln!(md);
    }

    let _ = writeln!(md, "## Findings");
    let _ = writeln!(md);
    if output.findings.is_empty() {
        let _ = writeln!(md, "No findings.");
    } else {
        for finding in &output.findings {
            let location = match finding.line {
                Some(line) => format!("{}:{}", finding.file, line),
                None => finding.file.clone(),
            };
            let _ = writeln!(
                md,
                "### {} `{}`",
                severity_label(finding.severity),
                location
            );
            let _ = writeln!(md);
            if let Some(rule_id) = &finding.rule_id {
                let _ = writeln!(md, "Rule: `{}`", rule_id);
                let _ = writeln!(md);
            }
            let _ = writeln!(md, "{}", finding.message);
            let _ = writeln!(md);
        }
    }

    md
}

fn severity_label(severity: FindingSeverity) -> &'static str {
    match severity {
        FindingSeverity::Critical => "CRITICAL",
        FindingSeverity::High => "HIGH",
        FindingSeverity::Medium => "MEDIUM",
        FindingSeverity::Low => "LOW",
        FindingSeverity::Info => "INFO",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scan::Finding;

    #[test]
    fn empty_output_renders_no_findings_section() {
        let md = render_markdown(&JobId::new(), &ScanOutput::default());
        assert!(md.contains("# Code Review Report"));
        assert!(md.contains("No findings."));
    }

    #[test]
    fn findings_appear_with_location_and_severity() {
        let output = ScanOutput {
            findings: vec![Finding {
                id: "f1".to_string(),
                rule_id: Some("SEC-7".to_string()),
                severity: FindingSeverity::Critical,
                message: "SQL built from user input".to_string(),
                file: "src/db.rs".to_string(),
                line: Some(88),
                column: None,
            }],
            files_scanned: 5,
            ..Default::default()
        };
        let md = render_markdown(&JobId::new(), &output);
        assert!(md.contains("CRITICAL `src/db.rs:88`"));
        assert!(md.contains("Rule: `SEC-7`"));
        assert!(md.contains("SQL built from user input"));
    }
}
