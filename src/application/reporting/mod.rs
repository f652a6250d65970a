//! Rendering of the fixed per-job artifact set from a scan output.

pub mod html;
pub mod markdown;
pub mod sarif;

use crate::domain::artifact::ArtifactName;
use crate::domain::job::JobId;
use crate::domain::scan::ScanOutput;

/// Render the full artifact set for a successful review, in the order the
/// store should persist them. Every artifact is produced even when empty so
/// consumers can rely on the fixed name set.
pub fn render_report_artifacts(
    job_id: &JobId,
    output: &ScanOutput,
) -> Result<Vec<(ArtifactName, Vec<u8>)>, serde_json::Error> {
    let sarif = serde_json::to_vec_pretty(&sarif::render_sarif(output))?;
    let md = markdown::render_markdown(job_id, output).into_bytes();
    let html = html::render_html(job_id, output).into_bytes();
    let log = output.log.clone().into_bytes();
    let traces = render_traces(output)?;

    Ok(vec![
        (ArtifactName::SarifReport, sarif),
        (ArtifactName::MarkdownReport, md),
        (ArtifactName::HtmlReport, html),
        (ArtifactName::WorkerLog, log),
        (ArtifactName::Traces, traces),
    ])
}

/// One JSON object per line, newline-terminated.
pub fn render_traces(output: &ScanOutput) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    for event in &output.traces {
        buf.extend_from_slice(serde_json::to_string(event)?.as_bytes());
        buf.push(b'\n');
    }
    Ok(buf)
}
