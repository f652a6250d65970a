//! Review submission, status, artifact, and cancel endpoints.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, warn};
use ulid::Ulid;

use crate::application::orchestrator::{CancelError, NewSubmission, SubmitError};
use crate::domain::artifact::ArtifactName;
use crate::domain::job::JobId;
use crate::domain::submission::{BundleRef, MetaEnvelope, SftpEnvelope, SubmissionMode};
use crate::infrastructure::artifact_store::ArtifactStoreError;
use crate::presentation::controllers::AppState;
use crate::presentation::models::{
    ReviewAcceptedResponse, ReviewStatusResponse, error_response,
};

/// POST /v1/reviews - Submit code for review
#[utoipa::path(
    post,
    path = "/v1/reviews",
    responses(
        (status = 202, description = "Review accepted", body = ReviewAcceptedResponse),
        (status = 400, description = "Malformed submission", body = crate::presentation::models::ErrorResponse),
        (status = 413, description = "Bundle exceeds the size ceiling", body = crate::presentation::models::ErrorResponse),
        (status = 429, description = "Service is at capacity", body = crate::presentation::models::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "reviews"
)]
pub async fn submit_review(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut mode: Option<SubmissionMode> = None;
    let mut meta: Option<MetaEnvelope> = None;
    let mut sftp: Option<SftpEnvelope> = None;
    let mut bundle: Option<BundleRef> = None;
    let mut attachment_count = 0usize;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return multipart_error("body", e),
        };
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "mode" => {
                let raw = match field.text().await {
                    Ok(raw) => raw,
                    Err(e) => return multipart_error("mode", e),
                };
                match SubmissionMode::parse(&raw) {
                    Ok(parsed) => mode = Some(parsed),
                    Err(message) => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            "VALIDATION_ERROR",
                            message,
                        );
                    }
                }
            }
            "meta" => {
                let raw = match field.text().await {
                    Ok(raw) => raw,
                    Err(e) => return multipart_error("meta", e),
                };
                match MetaEnvelope::parse(&raw) {
                    Ok(parsed) => meta = Some(parsed),
                    Err(e) => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            "VALIDATION_ERROR",
                            e.to_string(),
                        );
                    }
                }
            }
            "sftp" => {
                let raw = match field.text().await {
                    Ok(raw) => raw,
                    Err(e) => return multipart_error("sftp", e),
                };
                match SftpEnvelope::parse(&raw) {
                    Ok(parsed) => sftp = Some(parsed),
                    Err(e) => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            "VALIDATION_ERROR",
                            e.to_string(),
                        );
                    }
                }
            }
            "code_bundle" => {
                let filename = field
                    .file_name()
                    .unwrap_or("code_bundle.zip")
                    .to_string();
                let bytes = match field.bytes().await {
                    Ok(bytes) => bytes,
                    Err(e) => return multipart_error("code_bundle", e),
                };
                if bytes.len() as u64 > state.limits.max_bundle_bytes {
                    return error_response(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        "PAYLOAD_TOO_LARGE",
                        format!(
                            "code_bundle is {} bytes; the ceiling is {}",
                            bytes.len(),
                            state.limits.max_bundle_bytes
                        ),
                    );
                }
                match spool_bundle(&state, filename, &bytes).await {
                    Ok(spooled) => bundle = Some(spooled),
                    Err(e) => {
                        error!(error = %e, "Failed to spool uploaded bundle");
                        return error_response(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "STORAGE_ERROR",
                            "Failed to persist the uploaded bundle",
                        );
                    }
                }
            }
            "attachments[]" | "attachments" => {
                // Accepted and drained; attachments ride along for the worker
                // in a future revision.
                if field.bytes().await.is_ok() {
                    attachment_count += 1;
                }
            }
            other => {
                debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    let Some(mode) = mode else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "missing required part 'mode'",
        );
    };
    let Some(meta) = meta else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "missing required part 'meta'",
        );
    };
    if attachment_count > 0 {
        debug!(attachment_count, "Submission carried attachments");
    }

    let spool_path = bundle.as_ref().and_then(|b| b.spool_path.clone());
    let submission = NewSubmission {
        mode,
        meta,
        bundle,
        sftp,
    };

    match state.orchestrator.submit(submission).await {
        Ok(job) => (
            StatusCode::ACCEPTED,
            Json(ReviewAcceptedResponse {
                job_id: job.id,
                status: job.status,
            }),
        )
            .into_response(),
        Err(e) => {
            if let Some(path) = spool_path {
                if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %cleanup,
                        "Failed to remove spooled bundle for rejected submission");
                }
            }
            match e {
                SubmitError::Validation(message) => {
                    error_response(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
                }
                SubmitError::RateLimited(reason) => {
                    error_response(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", reason)
                }
                SubmitError::Repository(e) => {
                    error!(error = %e, "Failed to create job record");
                    error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "Failed to accept the submission",
                    )
                }
            }
        }
    }
}

/// Map a multipart read failure, preserving 413 when the body limit tripped.
fn multipart_error(part: &str, e: axum::extract::multipart::MultipartError) -> Response {
    let status = e.status();
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "PAYLOAD_TOO_LARGE"
    } else {
        "MULTIPART_ERROR"
    };
    error_response(status, code, format!("Failed to read '{}': {}", part, e))
}

async fn spool_bundle(
    state: &AppState,
    filename: String,
    bytes: &[u8],
) -> Result<BundleRef, std::io::Error> {
    tokio::fs::create_dir_all(&state.spool_dir).await?;
    let path = state.spool_dir.join(format!("{}.bundle", Ulid::new()));
    tokio::fs::write(&path, bytes).await?;
    Ok(BundleRef {
        filename,
        size_bytes: bytes.len() as u64,
        spool_path: Some(path),
    })
}

/// GET /v1/reviews/{job_id} - Retrieve job status
#[utoipa::path(
    get,
    path = "/v1/reviews/{job_id}",
    params(
        ("job_id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job found", body = ReviewStatusResponse),
        (status = 404, description = "Unknown job ID", body = crate::presentation::models::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "reviews"
)]
pub async fn get_review(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Response {
    let job_id = JobId::from_string(job_id);
    match state.orchestrator.get(&job_id).await {
        Ok(Some(job)) => Json(ReviewStatusResponse::from(job)).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("No job with id {}", job_id),
        ),
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Failed to load job");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Failed to load the job record",
            )
        }
    }
}

/// GET /v1/reviews/{job_id}/artifacts/{name} - Download a job artifact
#[utoipa::path(
    get,
    path = "/v1/reviews/{job_id}/artifacts/{name}",
    params(
        ("job_id" = String, Path, description = "Job ID"),
        ("name" = String, Path, description = "Artifact name, one of the fixed set")
    ),
    responses(
        (status = 200, description = "Artifact bytes"),
        (status = 404, description = "Unknown job, name, or artifact not yet produced", body = crate::presentation::models::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "reviews"
)]
pub async fn get_artifact(
    State(state): State<AppState>,
    Path((job_id, name)): Path<(String, String)>,
) -> Response {
    let job_id = JobId::from_string(job_id);
    // Only the fixed artifact names resolve; anything else is 404, never a path.
    let Some(name) = ArtifactName::parse(&name) else {
        return error_response(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("'{}' is not a known artifact name", name),
        );
    };

    match state.artifacts.get(&job_id, name).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, name.content_type())],
            bytes,
        )
            .into_response(),
        Err(ArtifactStoreError::NotFound { .. }) => error_response(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Artifact {} is not available for job {}", name, job_id),
        ),
        Err(e) => {
            error!(job_id = %job_id, artifact = %name, error = %e, "Failed to read artifact");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Failed to read the artifact",
            )
        }
    }
}

/// POST /v1/reviews/{job_id}/cancel - Cancel a queued or running job
#[utoipa::path(
    post,
    path = "/v1/reviews/{job_id}/cancel",
    params(
        ("job_id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 202, description = "Cancellation accepted", body = ReviewAcceptedResponse),
        (status = 404, description = "Unknown job ID", body = crate::presentation::models::ErrorResponse),
        (status = 409, description = "Job already reached a terminal state", body = crate::presentation::models::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "reviews"
)]
pub async fn cancel_review(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Response {
    let job_id = JobId::from_string(job_id);
    match state.orchestrator.cancel(&job_id).await {
        Ok(job) => (
            StatusCode::ACCEPTED,
            Json(ReviewAcceptedResponse {
                job_id: job.id,
                status: job.status,
            }),
        )
            .into_response(),
        Err(CancelError::NotFound(job_id)) => error_response(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("No job with id {}", job_id),
        ),
        Err(CancelError::AlreadyTerminal(status)) => error_response(
            StatusCode::CONFLICT,
            "ALREADY_TERMINAL",
            format!("Job is already {}", status),
        ),
        Err(CancelError::Repository(e)) => {
            error!(job_id = %job_id, error = %e, "Failed to cancel job");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Failed to cancel the job",
            )
        }
    }
}
