//! Centralized transition control for review jobs.
//!
//! Every status change funnels through [`JobWorkflow`], which applies it as a
//! compare-and-swap against the repository. When two paths race for the same
//! job (cancel vs completion, timeout vs cancel) exactly one CAS wins and the
//! loser observes a stale-status error it can discard. Terminal transitions
//! additionally fan out webhook notifications without blocking the caller.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::artifact::ArtifactRef;
use crate::domain::job::{JobError, JobId, JobStatus, ReviewJob, ReviewSummary};
use crate::infrastructure::job_repository::{
    JobRepository, JobRepositoryError, TransitionPayload,
};
use crate::infrastructure::webhook::WebhookDispatcher;

pub struct JobWorkflow {
    repository: Arc<dyn JobRepository>,
    webhooks: Arc<WebhookDispatcher>,
}

impl JobWorkflow {
    pub fn new(repository: Arc<dyn JobRepository>, webhooks: Arc<WebhookDispatcher>) -> Self {
        Self {
            repository,
            webhooks,
        }
    }

    /// Claim a queued job for execution. Loses (and returns stale) when the
    /// job was canceled while still queued.
    pub async fn start_job(&self, job_id: &JobId) -> Result<ReviewJob, JobRepositoryError> {
        let job = self
            .repository
            .compare_and_swap_status(
                job_id,
                JobStatus::Queued,
                JobStatus::Running,
                TransitionPayload::reason("worker slot acquired"),
            )
            .await?;
        info!(job_id = %job_id, attempt = job.attempt_count, "Job started");
        Ok(job)
    }

    /// Record a successful review. Summary and artifact refs land in the same
    /// CAS as the status, after every artifact byte is already persisted.
    pub async fn complete_job(
        &self,
        job_id: &JobId,
        summary: ReviewSummary,
        artifacts: Vec<ArtifactRef>,
    ) -> Result<ReviewJob, JobRepositoryError> {
        let payload = TransitionPayload {
            summary: Some(summary),
            artifacts: Some(artifacts),
            error: None,
            reason: None,
        };
        let job = self
            .repository
            .compare_and_swap_status(job_id, JobStatus::Running, JobStatus::Completed, payload)
            .await?;
        info!(job_id = %job_id, findings = job.summary.as_ref().map(|s| s.findings_total),
            "Job completed");
        Self::discard_spool(&job).await;
        self.notify(job.clone());
        Ok(job)
    }

    pub async fn fail_job(
        &self,
        job_id: &JobId,
        error: JobError,
    ) -> Result<ReviewJob, JobRepositoryError> {
        let reason = error.message.clone();
        let payload = TransitionPayload {
            summary: None,
            artifacts: None,
            error: Some(error),
            reason: Some(reason),
        };
        let job = self
            .repository
            .compare_and_swap_status(job_id, JobStatus::Running, JobStatus::Failed, payload)
            .await?;
        info!(job_id = %job_id, "Job failed");
        Self::discard_spool(&job).await;
        self.notify(job.clone());
        Ok(job)
    }

    /// Cancel a job that never started. The dispatch loop later skips its
    /// queue token when its own claim CAS comes back stale.
    pub async fn cancel_queued(&self, job_id: &JobId) -> Result<ReviewJob, JobRepositoryError> {
        let job = self
            .repository
            .compare_and_swap_status(
                job_id,
                JobStatus::Queued,
                JobStatus::Canceled,
                TransitionPayload::reason("canceled by caller before dispatch"),
            )
            .await?;
        info!(job_id = %job_id, "Queued job canceled");
        Self::discard_spool(&job).await;
        self.notify(job.clone());
        Ok(job)
    }

    /// Cancel a running job. The status flips first; the worker is signaled
    /// by the caller afterwards and its eventual result loses its own CAS.
    pub async fn cancel_running(&self, job_id: &JobId) -> Result<ReviewJob, JobRepositoryError> {
        let job = self
            .repository
            .compare_and_swap_status(
                job_id,
                JobStatus::Running,
                JobStatus::Canceled,
                TransitionPayload::reason("canceled by caller while running"),
            )
            .await?;
        info!(job_id = %job_id, "Running job canceled");
        Self::discard_spool(&job).await;
        self.notify(job.clone());
        Ok(job)
    }

    /// Remove the spooled upload once a job is terminal. It is only needed
    /// while an attempt might still read it; leaving it behind would grow
    /// the spool directory without bound.
    async fn discard_spool(job: &ReviewJob) {
        let Some(path) = job.bundle.as_ref().and_then(|b| b.spool_path.as_deref()) else {
            return;
        };
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(job_id = %job.id, path = %path.display(), "Spooled bundle removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(job_id = %job.id, path = %path.display(), error = %e,
                "Failed to remove spooled bundle"),
        }
    }

    fn notify(&self, job: ReviewJob) {
        debug!(job_id = %job.id, status = %job.status, "Dispatching webhook notifications");
        let dispatcher = Arc::clone(&self.webhooks);
        tokio::spawn(dispatcher.notify(job));
    }
}
