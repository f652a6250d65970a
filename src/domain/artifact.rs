//! Artifact identities and the fixed set of per-job output names.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The fixed set of artifacts a completed review produces.
///
/// Artifacts are write-once: nothing is mutated after the owning job reaches
/// a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ArtifactName {
    #[serde(rename = "report.sarif.json")]
    SarifReport,
    #[serde(rename = "report.md")]
    MarkdownReport,
    #[serde(rename = "report.html")]
    HtmlReport,
    #[serde(rename = "worker.log")]
    WorkerLog,
    #[serde(rename = "traces.jsonl")]
    Traces,
}

impl ArtifactName {
    pub const ALL: [ArtifactName; 5] = [
        Self::SarifReport,
        Self::MarkdownReport,
        Self::HtmlReport,
        Self::WorkerLog,
        Self::Traces,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SarifReport => "report.sarif.json",
            Self::MarkdownReport => "report.md",
            Self::HtmlReport => "report.html",
            Self::WorkerLog => "worker.log",
            Self::Traces => "traces.jsonl",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::SarifReport => "application/sarif+json",
            Self::MarkdownReport => "text/markdown; charset=utf-8",
            Self::HtmlReport => "text/html; charset=utf-8",
            Self::WorkerLog => "text/plain; charset=utf-8",
            Self::Traces => "application/x-ndjson",
        }
    }

    /// Parse a client-supplied artifact name. Anything outside the fixed enum
    /// is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.as_str() == raw)
    }
}

impl std::fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a stored artifact, returned by the artifact store on put.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ArtifactRef {
    pub name: ArtifactName,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_round_trips_through_parse() {
        for name in ArtifactName::ALL {
            assert_eq!(ArtifactName::parse(name.as_str()), Some(name));
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(ArtifactName::parse("report.pdf"), None);
        assert_eq!(ArtifactName::parse("../etc/passwd"), None);
    }

    #[test]
    fn serde_uses_the_wire_names() {
        let json = serde_json::to_string(&ArtifactName::SarifReport).unwrap();
        assert_eq!(json, "\"report.sarif.json\"");
    }
}
