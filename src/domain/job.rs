//! Review job entity and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use utoipa::ToSchema;

use super::artifact::ArtifactRef;
use super::submission::{BundleRef, MetaEnvelope, SftpEnvelope, SubmissionMode};

/// Opaque job identifier of the form `rev_<ulid>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(format!("rev_{}", Ulid::new()))
    }

    pub fn from_string(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job is waiting for a free worker slot
    Queued,
    /// Job is currently being scanned
    Running,
    /// Job completed successfully; summary and artifacts are available
    Completed,
    /// Job failed; a structured error is recorded
    Failed,
    /// Job was canceled before completion
    Canceled,
}

impl JobStatus {
    /// Returns the set of valid target states from the current state.
    ///
    /// ```text
    /// Queued ──► Running ──► Completed
    ///   │          │    └──► Failed
    ///   └──► Canceled ◄──┘
    /// ```
    pub fn valid_transitions(&self) -> &[JobStatus] {
        match self {
            Self::Queued => &[Self::Running, Self::Canceled],
            Self::Running => &[Self::Completed, Self::Failed, Self::Canceled],
            Self::Completed | Self::Failed | Self::Canceled => &[],
        }
    }

    /// Check whether transitioning to `target` is allowed from the current state.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        self.valid_transitions().contains(&target)
    }

    /// Whether this status represents a terminal (final) state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

/// Error returned when an invalid status transition is attempted.
#[derive(Debug, thiserror::Error)]
#[error("Invalid job transition from {from} to {to}")]
pub struct JobTransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Recorded state transition for a review job (audit trail).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobTransition {
    pub from: JobStatus,
    pub to: JobStatus,
    pub timestamp: DateTime<Utc>,
    /// Human-readable reason or context for the transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Classification of a job-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ErrorKind {
    /// The job exceeded its wall-clock timeout.
    Timeout,
    /// The scan worker raised a fatal error.
    Worker,
    /// Artifact or job persistence failed.
    Storage,
}

/// Structured error recorded on a failed job.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn worker(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Worker,
            message: message.into(),
        }
    }
}

/// Severity histogram over the findings of a completed review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SeverityBreakdown {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityBreakdown {
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

/// Summary of a completed review.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewSummary {
    pub files_scanned: u64,
    pub findings_total: usize,
    pub by_severity: SeverityBreakdown,
    /// Paths with the highest finding density, most affected first.
    pub hotspots: Vec<String>,
}

/// One submitted review request and its full lifecycle record.
///
/// Invariants: `summary` and `artifacts` are non-null iff the job is
/// completed; `error` is non-null iff the job failed. The job repository is
/// the only writer of `status` once the job is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewJob {
    pub id: JobId,
    pub mode: SubmissionMode,
    pub meta: MetaEnvelope,
    /// Bundle reference, present iff mode is zip.
    pub bundle: Option<BundleRef>,
    /// SFTP connection envelope, present iff mode is sftp.
    pub sftp: Option<SftpEnvelope>,
    pub status: JobStatus,
    pub summary: Option<ReviewSummary>,
    pub artifacts: Option<Vec<ArtifactRef>>,
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub attempt_count: u32,
    /// Ordered history of state transitions (audit trail).
    #[serde(default)]
    pub transitions: Vec<JobTransition>,
}

impl ReviewJob {
    pub fn new(
        mode: SubmissionMode,
        meta: MetaEnvelope,
        bundle: Option<BundleRef>,
        sftp: Option<SftpEnvelope>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            mode,
            meta,
            bundle,
            sftp,
            status: JobStatus::Queued,
            summary: None,
            artifacts: None,
            error: None,
            created_at: now,
            updated_at: now,
            attempt_count: 0,
            transitions: Vec::new(),
        }
    }

    /// Apply a validated status transition and record it on the audit trail.
    pub fn transition(
        &mut self,
        next: JobStatus,
        reason: Option<String>,
    ) -> Result<(), JobTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(JobTransitionError {
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now();
        self.transitions.push(JobTransition {
            from: self.status,
            to: next,
            timestamp: now,
            reason,
        });
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::submission::MetaEnvelope;

    fn meta() -> MetaEnvelope {
        MetaEnvelope::parse(r#"{"project": "demo"}"#).unwrap()
    }

    #[test]
    fn job_ids_carry_the_rev_prefix() {
        let id = JobId::new();
        assert!(id.as_str().starts_with("rev_"));
    }

    #[test]
    fn job_ids_are_unique() {
        let a = JobId::new();
        let b = JobId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn new_jobs_start_queued() {
        let job = ReviewJob::new(SubmissionMode::Zip, meta(), None, None);
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.summary.is_none());
        assert!(job.artifacts.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn terminal_states_admit_no_transitions() {
        for status in [JobStatus::Completed, JobStatus::Failed, JobStatus::Canceled] {
            assert!(status.is_terminal());
            assert!(status.valid_transitions().is_empty());
        }
    }

    #[test]
    fn queued_cannot_skip_to_completed() {
        let mut job = ReviewJob::new(SubmissionMode::Zip, meta(), None, None);
        assert!(job.transition(JobStatus::Completed, None).is_err());
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[test]
    fn transition_records_audit_trail() {
        let mut job = ReviewJob::new(SubmissionMode::Zip, meta(), None, None);
        job.transition(JobStatus::Running, Some("worker slot acquired".into()))
            .unwrap();
        job.transition(JobStatus::Completed, None).unwrap();
        assert_eq!(job.transitions.len(), 2);
        assert_eq!(job.transitions[0].from, JobStatus::Queued);
        assert_eq!(job.transitions[1].to, JobStatus::Completed);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Queued).unwrap(),
            "\"queued\""
        );
        assert_eq!(JobStatus::Canceled.to_string(), "canceled");
    }
}
