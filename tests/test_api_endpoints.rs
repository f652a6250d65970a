//! Integration tests for API endpoints

mod common;

use axum::http::StatusCode;
use std::sync::Arc;
use std::time::Duration;

use common::{
    HangingWorker, ScriptedWorker, body_bytes, body_json, get, multipart_body, post,
    post_multipart, spawn_app, submit_zip, test_config, wait_for_status, zip_submission_body,
};

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let app = spawn_app(test_config(), Arc::new(ScriptedWorker::instant())).await;
    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn zip_submission_runs_to_completion() {
    let app = spawn_app(test_config(), Arc::new(ScriptedWorker::instant())).await;

    let job_id = submit_zip(&app).await;
    assert!(job_id.starts_with("rev_"));

    let job = wait_for_status(&app, &job_id, "completed").await;
    assert_eq!(job["summary"]["findings_total"], 2);
    assert_eq!(job["summary"]["by_severity"]["high"], 1);
    assert_eq!(job["artifacts"].as_array().unwrap().len(), 5);
    assert!(job["error"].is_null());
}

#[tokio::test]
async fn sftp_submission_is_accepted_without_bundle() {
    let app = spawn_app(test_config(), Arc::new(ScriptedWorker::instant())).await;

    let body = multipart_body(&[
        ("mode", None, b"sftp"),
        ("meta", None, br#"{"project": "demo"}"#),
        (
            "sftp",
            None,
            br#"{"host": "sftp.example.com", "username": "ci", "path": "/srv/code.zip"}"#,
        ),
    ]);
    let response = post_multipart(&app, "/v1/reviews", body).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn submission_without_meta_is_rejected() {
    let app = spawn_app(test_config(), Arc::new(ScriptedWorker::instant())).await;

    let body = multipart_body(&[
        ("mode", None, b"zip"),
        ("code_bundle", Some("code.zip"), b"bytes"),
    ]);
    let response = post_multipart(&app, "/v1/reviews", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_mode_is_rejected() {
    let app = spawn_app(test_config(), Arc::new(ScriptedWorker::instant())).await;

    let body = multipart_body(&[
        ("mode", None, b"tarball"),
        ("meta", None, br#"{"project": "demo"}"#),
    ]);
    let response = post_multipart(&app, "/v1/reviews", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_bundle_is_rejected_with_413() {
    let mut config = test_config();
    config.limits.max_bundle_bytes = 8;
    let app = spawn_app(config, Arc::new(ScriptedWorker::instant())).await;

    let body = multipart_body(&[
        ("mode", None, b"zip"),
        ("meta", None, br#"{"project": "demo"}"#),
        ("code_bundle", Some("code.zip"), b"way more than eight bytes"),
    ]);
    let response = post_multipart(&app, "/v1/reviews", body).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn saturated_service_answers_429() {
    let mut config = test_config();
    config.limits.max_in_flight_jobs = 1;
    let app = spawn_app(config, Arc::new(HangingWorker)).await;

    submit_zip(&app).await;
    let response = post_multipart(&app, "/v1/reviews", zip_submission_body()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let json = body_json(response).await;
    assert_eq!(json["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn unknown_job_id_is_404() {
    let app = spawn_app(test_config(), Arc::new(ScriptedWorker::instant())).await;
    let response = get(&app, "/v1/reviews/rev_does_not_exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn artifacts_are_downloadable_after_completion() {
    let app = spawn_app(test_config(), Arc::new(ScriptedWorker::instant())).await;

    let job_id = submit_zip(&app).await;
    wait_for_status(&app, &job_id, "completed").await;

    let response = get(&app, &format!("/v1/reviews/{}/artifacts/report.md", job_id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/markdown; charset=utf-8"
    );
    let markdown = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(markdown.contains("# Code Review Report"));
    assert!(markdown.contains("hardcoded credential"));

    let response = get(
        &app,
        &format!("/v1/reviews/{}/artifacts/report.sarif.json", job_id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let sarif: serde_json::Value =
        serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(sarif["version"], "2.1.0");
    assert_eq!(sarif["runs"][0]["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn artifact_names_outside_the_fixed_set_are_404() {
    let app = spawn_app(test_config(), Arc::new(ScriptedWorker::instant())).await;

    let job_id = submit_zip(&app).await;
    wait_for_status(&app, &job_id, "completed").await;

    let response = get(
        &app,
        &format!("/v1/reviews/{}/artifacts/..%2F..%2Fetc%2Fpasswd", job_id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app, &format!("/v1/reviews/{}/artifacts/report.pdf", job_id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_running_job_then_conflict_on_repeat() {
    let app = spawn_app(test_config(), Arc::new(HangingWorker)).await;

    let job_id = submit_zip(&app).await;
    wait_for_status(&app, &job_id, "running").await;

    let response = post(&app, &format!("/v1/reviews/{}/cancel", job_id)).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["status"], "canceled");

    let job = wait_for_status(&app, &job_id, "canceled").await;
    assert!(job["summary"].is_null());
    assert!(job["artifacts"].is_null());

    let response = post(&app, &format!("/v1/reviews/{}/cancel", job_id)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancel_unknown_job_is_404() {
    let app = spawn_app(test_config(), Arc::new(ScriptedWorker::instant())).await;
    let response = post(&app, "/v1/reviews/rev_missing/cancel").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn slow_worker_is_failed_by_the_job_timeout() {
    let mut config = test_config();
    config.dispatch.job_timeout_seconds = 1;
    let app = spawn_app(
        config,
        Arc::new(ScriptedWorker::slow(Duration::from_secs(30))),
    )
    .await;

    let job_id = submit_zip(&app).await;
    let job = wait_for_status(&app, &job_id, "failed").await;
    assert_eq!(job["error"]["kind"], "Timeout");
    assert!(job["artifacts"].is_null());
}
