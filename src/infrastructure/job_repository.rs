//! Durable job records and the compare-and-swap transition primitive.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::artifact::ArtifactRef;
use crate::domain::job::{JobError, JobId, JobStatus, ReviewJob, ReviewSummary};

/// Job persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum JobRepositoryError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job already exists: {0}")]
    AlreadyExists(JobId),

    /// The CAS expectation did not hold: another transition won the race.
    #[error("Stale status for {job_id}: expected {expected}, found {actual}")]
    StaleStatus {
        job_id: JobId,
        expected: JobStatus,
        actual: JobStatus,
    },

    #[error("Transition from {expected} to {next} is not allowed")]
    InvalidTransition {
        expected: JobStatus,
        next: JobStatus,
    },

    #[error("Storage backend failure: {0}")]
    Backend(String),
}

/// Data applied together with a status transition.
///
/// Completion carries summary and artifact refs, failure carries the error;
/// everything is written in the same CAS so a reader never observes a
/// terminal status with its payload missing.
#[derive(Debug, Default, Clone)]
pub struct TransitionPayload {
    pub summary: Option<ReviewSummary>,
    pub artifacts: Option<Vec<ArtifactRef>>,
    pub error: Option<JobError>,
    pub reason: Option<String>,
}

impl TransitionPayload {
    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// Source of truth for job records. The only writer of `status`.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: ReviewJob) -> Result<(), JobRepositoryError>;

    async fn get(&self, job_id: &JobId) -> Result<Option<ReviewJob>, JobRepositoryError>;

    /// Atomically transition `job_id` from `expected` to `next`, applying the
    /// payload. Exactly one of N concurrent attempts succeeds; the losers
    /// observe [`JobRepositoryError::StaleStatus`].
    async fn compare_and_swap_status(
        &self,
        job_id: &JobId,
        expected: JobStatus,
        next: JobStatus,
        payload: TransitionPayload,
    ) -> Result<ReviewJob, JobRepositoryError>;

    /// Number of jobs currently queued or running, for submission backpressure.
    async fn count_in_flight(&self) -> usize;
}

/// In-memory repository. Per-job atomicity comes from the single write lock;
/// the CAS check and the mutation happen under the same guard.
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: Arc<RwLock<HashMap<JobId, ReviewJob>>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: ReviewJob) -> Result<(), JobRepositoryError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(JobRepositoryError::AlreadyExists(job.id.clone()));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> Result<Option<ReviewJob>, JobRepositoryError> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn compare_and_swap_status(
        &self,
        job_id: &JobId,
        expected: JobStatus,
        next: JobStatus,
        payload: TransitionPayload,
    ) -> Result<ReviewJob, JobRepositoryError> {
        if !expected.can_transition_to(next) {
            return Err(JobRepositoryError::InvalidTransition { expected, next });
        }

        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| JobRepositoryError::NotFound(job_id.clone()))?;

        if job.status != expected {
            return Err(JobRepositoryError::StaleStatus {
                job_id: job_id.clone(),
                expected,
                actual: job.status,
            });
        }

        job.transition(next, payload.reason)
            .map_err(|e| JobRepositoryError::InvalidTransition {
                expected: e.from,
                next: e.to,
            })?;

        if next == JobStatus::Running {
            job.attempt_count += 1;
        }
        if payload.summary.is_some() {
            job.summary = payload.summary;
        }
        if payload.artifacts.is_some() {
            job.artifacts = payload.artifacts;
        }
        if payload.error.is_some() {
            job.error = payload.error;
        }

        Ok(job.clone())
    }

    async fn count_in_flight(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| !job.status.is_terminal())
            .count()
    }
}
