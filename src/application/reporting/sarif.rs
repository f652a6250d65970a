//! SARIF report format implementation

use serde_json::{Value, json};

use crate::domain::scan::{Finding, FindingSeverity, ScanOutput};

/// Render the findings of a completed review as a SARIF 2.1.0 document.
pub fn render_sarif(output: &ScanOutput) -> Value {
    json!({
        "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "reviewd",
                    "version": env!("CARGO_PKG_VERSION"),
                }
            },
            "results": output.findings.iter().map(finding_to_result).collect::<Vec<_>>(),
            "properties": {
                "files_scanned": output.files_scanned,
                "total_findings": output.findings.len(),
            }
        }]
    })
}

fn finding_to_result(finding: &Finding) -> Value {
    let mut result = json!({
        "message": {
            "text": finding.message
        },
        "level": severity_level(finding.severity),
    });

    if let Some(rule_id) = &finding.rule_id {
        result["ruleId"] = json!(rule_id);
    }

    let mut location = json!({
        "physicalLocation": {
            "artifactLocation": {
                "uri": finding.file
            }
        }
    });
    if let Some(line) = finding.line {
        let mut region = json!({
            "startLine": line
        });
        if let Some(column) = finding.column {
            region["startColumn"] = json!(column);
        }
        location["physicalLocation"]["region"] = region;
    }
    result["locations"] = json!([location]);

    result
}

fn severity_level(severity: FindingSeverity) -> &'static str {
    match severity {
        FindingSeverity::Critical | FindingSeverity::High => "error",
        FindingSeverity::Medium => "warning",
        FindingSeverity::Low | FindingSeverity::Info => "note",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: FindingSeverity) -> Finding {
        Finding {
            id: "f1".to_string(),
            rule_id: Some("SEC-101".to_string()),
            severity,
            message: "hardcoded credential".to_string(),
            file: "src/auth.rs".to_string(),
            line: Some(42),
            column: Some(7),
        }
    }

    #[test]
    fn document_carries_schema_and_version() {
        let sarif = render_sarif(&ScanOutput::default());
        assert_eq!(sarif["version"], "2.1.0");
        assert_eq!(sarif["runs"][0]["results"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn findings_map_to_results_with_locations() {
        let output = ScanOutput {
            findings: vec![finding(FindingSeverity::High)],
            files_scanned: 3,
            ..Default::default()
        };
        let sarif = render_sarif(&output);
        let result = &sarif["runs"][0]["results"][0];

        assert_eq!(result["level"], "error");
        assert_eq!(result["ruleId"], "SEC-101");
        assert_eq!(
            result["locations"][0]["physicalLocation"]["artifactLocation"]["uri"],
            "src/auth.rs"
        );
        assert_eq!(
            result["locations"][0]["physicalLocation"]["region"]["startLine"],
            42
        );
    }

    #[test]
    fn severity_levels_follow_sarif_mapping() {
        assert_eq!(severity_level(FindingSeverity::Critical), "error");
        assert_eq!(severity_level(FindingSeverity::Medium), "warning");
        assert_eq!(severity_level(FindingSeverity::Info), "note");
    }
}
