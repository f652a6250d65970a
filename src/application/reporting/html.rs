//! HTML report rendering. Finding fields come from an untrusted worker, so
//! everything interpolated into markup is escaped.

use std::fmt::Write;

use crate::domain::job::JobId;
use crate::domain::scan::{FindingSeverity, ScanOutput};

pub fn render_html(job_id: &JobId, output: &ScanOutput) -> String {
    let summary = output.summary();
    let mut html = String::new();

    let _ = writeln!(html, "<!DOCTYPE html>");
    let _ = writeln!(html, "<html lang=\"en\">");
    let _ = writeln!(
        html,
        "<head><meta charset=\"utf-8\"><title>Code Review Report {}</title></head>",
        escape(job_id.as_str())
    );
    let _ = writeln!(html, "<body>");
    let _ = writeln!(html, "<h1>Code Review Report</h1>");
    let _ = writeln!(
        html,
        "<p>Job <code>{}</code>: {} findings across {} files.</p>",
        escape(job_id.as_str()),
        summary.findings_total,
        summary.files_scanned
    );

    let _ = writeln!(html, "<h2>Severity Breakdown</h2>");
    let _ = writeln!(html, "<table><tr><th>Severity</th><th>Count</th></tr>");
    for (label, count) in [
        ("Critical", summary.by_severity.critical),
        ("High", summary.by_severity.high),
        ("Medium", summary.by_severity.medium),
        ("Low", summary.by_severity.low),
        ("Info", summary.by_severity.info),
    ] {
        let _ = writeln!(html, "<tr><td>{}</td><td>{}</td></tr>", label, count);
    }
    let _ = writeln!(html, "</table>");

    let _ = writeln!(html, "<h2>Findings</h2>");
    if output.findings.is_empty() {
        let _ = writeln!(html, "<p>No findings.</p>");
    } else {
        let _ = writeln!(html, "<ul>");
        for finding in &output.findings {
            let location = match finding.line {
                Some(line) => format!("{}:{}", finding.file, line),
                None => finding.file.clone(),
            };
            let _ = writeln!(
                html,
                "<li><strong>{}</strong> <code>{}</code>: {}</li>",
                severity_label(finding.severity),
                escape(&location),
                escape(&finding.message)
            );
        }
        let _ = writeln!(html, "</ul>");
    }

    let _ = writeln!(html, "</body>");
    let _ = writeln!(html, "</html>");
    html
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

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
