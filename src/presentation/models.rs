//! API request and response models

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::artifact::ArtifactRef;
use crate::domain::job::{JobError, JobId, JobStatus, ReviewJob, ReviewSummary};

/// Response for an accepted review submission
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReviewAcceptedResponse {
    /// Job ID for tracking
    #[schema(example = "rev_01J9W2N8V8Z0B1T9Q6K3F7XMAB")]
    pub job_id: JobId,

    /// Job status
    #[schema(example = "queued")]
    pub status: JobStatus,
}

/// Full job record returned by the status endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReviewStatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Submission mode, `zip` or `sftp`
    #[schema(example = "zip")]
    pub mode: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub attempt_count: u32,
    /// Present iff the job completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ReviewSummary>,
    /// Present iff the job completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<ArtifactRef>>,
    /// Present iff the job failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

impl From<ReviewJob> for ReviewStatusResponse {
    fn from(job: ReviewJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            mode: job.mode.to_string(),
            created_at: job.created_at,
            updated_at: job.updated_at,
            attempt_count: job.attempt_count,
            summary: job.summary,
            artifacts: job.artifacts,
            error: job.error,
        }
    }
}

/// Error response model
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code
    #[schema(example = "VALIDATION_ERROR")]
    pub code: String,

    /// Human-readable error message
    #[schema(example = "mode 'zip' requires a code_bundle part")]
    pub message: String,

    /// Additional error context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Unique request identifier for tracking and support
    pub request_id: Uuid,

    /// Error occurrence timestamp
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            request_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Build an error response with the given status.
pub fn error_response(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(code, message))).into_response()
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall service health status
    #[schema(example = "healthy")]
    pub status: String,

    /// Current service version
    #[schema(example = "0.1.0")]
    pub version: String,

    /// Health check timestamp
    pub timestamp: DateTime<Utc>,
}
