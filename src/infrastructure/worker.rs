//! Built-in scan worker used when no real engine is plugged in.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::scan::ScanOutput;
use crate::domain::services::{ScanContext, ScanError, ScanWorker};

/// Worker that performs no analysis and reports zero findings.
///
/// Keeps the service runnable end to end (submission, dispatch, artifacts,
/// webhooks) before a real engine is wired in.
#[derive(Debug, Clone, Default)]
pub struct NoopScanWorker;

#[async_trait]
impl ScanWorker for NoopScanWorker {
    async fn scan(
        &self,
        context: ScanContext,
        cancel: CancellationToken,
    ) -> Result<ScanOutput, ScanError> {
        if cancel.is_cancelled() {
            return Err(ScanError::Canceled);
        }
        debug!(job_id = %context.job_id, mode = %context.mode, "Noop scan");
        Ok(ScanOutput {
            findings: Vec::new(),
            files_scanned: 0,
            log: format!("noop scan for {}: no engine configured\n", context.job_id),
            traces: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::JobId;
    use crate::domain::submission::{MetaEnvelope, SubmissionMode};

    #[tokio::test]
    async fn noop_worker_reports_nothing() {
        let context = ScanContext {
            job_id: JobId::new(),
            mode: SubmissionMode::Zip,
            bundle: None,
            sftp: None,
            meta: MetaEnvelope::parse(r#"{"project": "demo"}"#).unwrap(),
        };
        let output = NoopScanWorker
            .scan(context, CancellationToken::new())
            .await
            .unwrap();
        assert!(output.findings.is_empty());
        assert!(output.log.contains("no engine configured"));
    }
}
