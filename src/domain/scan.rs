//! What the pluggable scan worker hands back to the core.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

use super::job::{ReviewSummary, SeverityBreakdown};

/// Severity of a single finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

/// One issue reported by the scan worker.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Finding {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub severity: FindingSeverity,
    pub message: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

/// Complete output of one scan worker invocation.
///
/// The core treats the worker as an opaque function: it renders the report
/// artifacts from `findings` and persists `log` / `traces` verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanOutput {
    pub findings: Vec<Finding>,
    pub files_scanned: u64,
    /// Raw worker log, persisted as `worker.log`.
    pub log: String,
    /// Structured trace events, persisted line-per-event as `traces.jsonl`.
    pub traces: Vec<serde_json::Value>,
}

impl ScanOutput {
    /// Build the review summary: severity histogram plus the paths with the
    /// highest finding density, most affected first.
    pub fn summary(&self) -> ReviewSummary {
        let mut by_severity = SeverityBreakdown::default();
        let mut per_file: HashMap<&str, usize> = HashMap::new();
        for finding in &self.findings {
            match finding.severity {
                FindingSeverity::Critical => by_severity.critical += 1,
                FindingSeverity::High => by_severity.high += 1,
                FindingSeverity::Medium => by_severity.medium += 1,
                FindingSeverity::Low => by_severity.low += 1,
                FindingSeverity::Info => by_severity.info += 1,
            }
            *per_file.entry(finding.file.as_str()).or_default() += 1;
        }

        let mut ranked: Vec<(&str, usize)> = per_file.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let hotspots = ranked
            .into_iter()
            .take(5)
            .map(|(path, _)| path.to_string())
            .collect();

        ReviewSummary {
            files_scanned: self.files_scanned,
            findings_total: self.findings.len(),
            by_severity,
            hotspots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(id: &str, severity: FindingSeverity, file: &str) -> Finding {
        Finding {
            id: id.to_string(),
            rule_id: None,
            severity,
            message: "test".to_string(),
            file: file.to_string(),
            line: Some(1),
            column: None,
        }
    }

    #[test]
    fn summary_totals_match_histogram() {
        let output = ScanOutput {
            findings: vec![
                finding("f1", FindingSeverity::High, "src/auth.rs"),
                finding("f2", FindingSeverity::High, "src/auth.rs"),
                finding("f3", FindingSeverity::Low, "src/db.rs"),
            ],
            files_scanned: 12,
            ..Default::default()
        };
        let summary = output.summary();
        assert_eq!(summary.findings_total, 3);
        assert_eq!(summary.by_severity.total(), summary.findings_total);
        assert_eq!(summary.files_scanned, 12);
    }

    #[test]
    fn hotspots_rank_by_finding_count() {
        let output = ScanOutput {
            findings: vec![
                finding("f1", FindingSeverity::Info, "b.rs"),
                finding("f2", FindingSeverity::Info, "a.rs"),
                finding("f3", FindingSeverity::Info, "a.rs"),
            ],
            files_scanned: 2,
            ..Default::default()
        };
        assert_eq!(output.summary().hotspots, vec!["a.rs", "b.rs"]);
    }
}
