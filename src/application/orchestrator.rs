//! Submission intake and caller-facing job operations.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::LimitsConfig;
use crate::domain::job::{JobId, JobStatus, ReviewJob};
use crate::domain::submission::{BundleRef, MetaEnvelope, SftpEnvelope, SubmissionMode};
use crate::infrastructure::dispatch::{CancelRegistry, DispatchQueue};
use crate::infrastructure::job_repository::{JobRepository, JobRepositoryError};

use super::workflow::JobWorkflow;

/// A validated submission ready to become a job.
#[derive(Debug)]
pub struct NewSubmission {
    pub mode: SubmissionMode,
    pub meta: MetaEnvelope,
    pub bundle: Option<BundleRef>,
    pub sftp: Option<SftpEnvelope>,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("{0}")]
    Validation(String),

    #[error("Service is at capacity: {0}")]
    RateLimited(&'static str),

    #[error(transparent)]
    Repository(#[from] JobRepositoryError),
}

#[derive(Debug, thiserror::Error)]
pub enum CancelError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job is already {0}")]
    AlreadyTerminal(JobStatus),

    #[error(transparent)]
    Repository(#[from] JobRepositoryError),
}

/// Front door for submissions: admission control, record creation, enqueue.
pub struct JobOrchestrator {
    repository: Arc<dyn JobRepository>,
    workflow: Arc<JobWorkflow>,
    queue: DispatchQueue,
    cancels: CancelRegistry,
    limits: LimitsConfig,
}

impl JobOrchestrator {
    pub fn new(
        repository: Arc<dyn JobRepository>,
        workflow: Arc<JobWorkflow>,
        queue: DispatchQueue,
        cancels: CancelRegistry,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            repository,
            workflow,
            queue,
            cancels,
            limits,
        }
    }

    /// Accept a submission: create the job record, then hand its id to the
    /// dispatch queue. The queue slot is reserved before the record is
    /// created so a saturated queue never leaves an orphan record behind.
    pub async fn submit(&self, submission: NewSubmission) -> Result<ReviewJob, SubmitError> {
        match submission.mode {
            SubmissionMode::Zip if submission.bundle.is_none() => {
                return Err(SubmitError::Validation(
                    "mode 'zip' requires a code_bundle part".to_string(),
                ));
            }
            SubmissionMode::Sftp if submission.sftp.is_none() => {
                return Err(SubmitError::Validation(
                    "mode 'sftp' requires an sftp part".to_string(),
                ));
            }
            _ => {}
        }

        if self.repository.count_in_flight().await >= self.limits.max_in_flight_jobs {
            return Err(SubmitError::RateLimited("too many jobs in flight"));
        }
        let slot = self
            .queue
            .try_reserve()
            .map_err(|_| SubmitError::RateLimited("dispatch queue is full"))?;

        let job = ReviewJob::new(
            submission.mode,
            submission.meta,
            submission.bundle,
            submission.sftp,
        );
        self.repository.create(job.clone()).await?;
        slot.send(job.id.clone());

        info!(job_id = %job.id, mode = %job.mode, project = job.meta.project(),
            "Review accepted");
        Ok(job)
    }

    pub async fn get(&self, job_id: &JobId) -> Result<Option<ReviewJob>, JobRepositoryError> {
        self.repository.get(job_id).await
    }

    /// Cancel a queued or running job. The status CAS flips first so the
    /// cancel wins deterministically; a running worker is then signaled and
    /// its eventual result is discarded as stale.
    pub async fn cancel(&self, job_id: &JobId) -> Result<ReviewJob, CancelError> {
        let job = self
            .repository
            .get(job_id)
            .await?
            .ok_or_else(|| CancelError::NotFound(job_id.clone()))?;

        if job.status.is_terminal() {
            return Err(CancelError::AlreadyTerminal(job.status));
        }

        if job.status == JobStatus::Queued {
            match self.workflow.cancel_queued(job_id).await {
                Ok(job) => return Ok(job),
                // Lost the race with dispatch; the job is running now.
                Err(JobRepositoryError::StaleStatus {
                    actual: JobStatus::Running,
                    ..
                }) => {}
                Err(JobRepositoryError::StaleStatus { actual, .. }) => {
                    return Err(CancelError::AlreadyTerminal(actual));
                }
                Err(e) => return Err(e.into()),
            }
        }

        match self.workflow.cancel_running(job_id).await {
            Ok(job) => {
                if !self.cancels.cancel(job_id).await {
                    warn!(job_id = %job_id, "Canceled running job had no cancellation token");
                }
                Ok(job)
            }
            Err(JobRepositoryError::StaleStatus { actual, .. }) => {
                Err(CancelError::AlreadyTerminal(actual))
            }
            Err(e) => Err(e.into()),
        }
    }
}
