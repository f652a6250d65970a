//! Domain service seams implemented by infrastructure or plugged in by hosts.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::job::JobId;
use super::scan::ScanOutput;
use super::submission::{BundleRef, MetaEnvelope, SftpEnvelope, SubmissionMode};

/// Everything a worker needs to run one review.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub job_id: JobId,
    pub mode: SubmissionMode,
    pub bundle: Option<BundleRef>,
    pub sftp: Option<SftpEnvelope>,
    pub meta: MetaEnvelope,
}

/// Fatal outcomes of a scan worker invocation.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The worker observed the cancellation signal and stopped.
    #[error("scan canceled")]
    Canceled,

    /// The scan engine raised a fatal error; captured verbatim on the job.
    #[error("{0}")]
    Fatal(String),
}

/// The pluggable scan engine.
///
/// The core invokes this as an opaque function under a hard wall-clock
/// timeout. Implementations should watch `cancel` and return
/// [`ScanError::Canceled`] promptly; workers that ignore it are
/// force-abandoned after a grace period.
#[async_trait]
pub trait ScanWorker: Send + Sync {
    async fn scan(
        &self,
        context: ScanContext,
        cancel: CancellationToken,
    ) -> Result<ScanOutput, ScanError>;
}
