//! Shared harness for integration tests: an in-process app with an
//! in-memory artifact store and a scriptable scan worker.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use reviewd::Config;
use reviewd::app::create_app_with;
use reviewd::domain::scan::{Finding, FindingSeverity, ScanOutput};
use reviewd::domain::services::{ScanContext, ScanError, ScanWorker};
use reviewd::infrastructure::artifact_store::{ArtifactStore, InMemoryArtifactStore};

pub struct TestApp {
    pub router: Router,
    pub shutdown: CancellationToken,
    pub spool_dir: std::path::PathBuf,
    // Held so the spool directory outlives the test.
    _tempdir: tempfile::TempDir,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Test configuration: tight limits, fast timeouts, no docs.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.enable_docs = false;
    config.dispatch.max_concurrent_jobs = 2;
    config.dispatch.job_timeout_seconds = 5;
    config.dispatch.cancel_grace_seconds = 1;
    config.webhook.backoff_base_ms = 10;
    config.webhook.backoff_max_ms = 50;
    config
}

pub async fn spawn_app(config: Config, worker: Arc<dyn ScanWorker>) -> TestApp {
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(InMemoryArtifactStore::new());
    spawn_app_with_store(config, worker, artifacts).await
}

pub async fn spawn_app_with_store(
    mut config: Config,
    worker: Arc<dyn ScanWorker>,
    artifacts: Arc<dyn ArtifactStore>,
) -> TestApp {
    let tempdir = tempfile::tempdir().expect("tempdir");
    config.storage.artifact_root = tempdir.path().to_path_buf();

    let handle = create_app_with(config, worker, artifacts)
        .await
        .expect("app should build");
    TestApp {
        router: handle.router,
        shutdown: handle.shutdown_token,
        spool_dir: tempdir.path().join("_spool"),
        _tempdir: tempdir,
    }
}

/// Worker that reports a fixed set of findings after an optional delay.
pub struct ScriptedWorker {
    pub findings: Vec<Finding>,
    pub delay: Duration,
}

impl ScriptedWorker {
    pub fn instant() -> Self {
        Self {
            findings: sample_findings(),
            delay: Duration::ZERO,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            findings: sample_findings(),
            delay,
        }
    }
}

#[async_trait]
impl ScanWorker for ScriptedWorker {
    async fn scan(
        &self,
        context: ScanContext,
        cancel: CancellationToken,
    ) -> Result<ScanOutput, ScanError> {
        if !self.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = cancel.cancelled() => return Err(ScanError::Canceled),
            }
        }
        Ok(ScanOutput {
            findings: self.findings.clone(),
            files_scanned: 7,
            log: format!("scanned job {}\n", context.job_id),
            traces: vec![serde_json::json!({"step": "scan", "ok": true})],
        })
    }
}

/// Worker that blocks until canceled.
pub struct HangingWorker;

#[async_trait]
impl ScanWorker for HangingWorker {
    async fn scan(
        &self,
        _context: ScanContext,
        cancel: CancellationToken,
    ) -> Result<ScanOutput, ScanError> {
        cancel.cancelled().await;
        Err(ScanError::Canceled)
    }
}

pub fn sample_findings() -> Vec<Finding> {
    vec![
        Finding {
            id: "f-1".to_string(),
            rule_id: Some("SEC-101".to_string()),
            severity: FindingSeverity::High,
            message: "hardcoded credential".to_string(),
            file: "src/auth.rs".to_string(),
            line: Some(12),
            column: None,
        },
        Finding {
            id: "f-2".to_string(),
            rule_id: None,
            severity: FindingSeverity::Low,
            message: "unused import".to_string(),
            file: "src/lib.rs".to_string(),
            line: Some(3),
            column: Some(5),
        },
    ]
}

pub const BOUNDARY: &str = "reviewd-test-boundary";

/// Build a multipart/form-data body from (name, filename, content) parts.
pub fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\r\n",
                    name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// A minimal valid zip submission.
pub fn zip_submission_body() -> Vec<u8> {
    multipart_body(&[
        ("mode", None, b"zip"),
        ("meta", None, br#"{"project": "demo"}"#),
        ("code_bundle", Some("code.zip"), b"PK\x03\x04fakezip"),
    ])
}

pub async fn post_multipart(app: &TestApp, uri: &str, body: Vec<u8>) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .expect("request");
    app.router.clone().oneshot(request).await.expect("response")
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    app.router.clone().oneshot(request).await.expect("response")
}

pub async fn post(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    app.router.clone().oneshot(request).await.expect("response")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec()
}

/// Submit a zip review and return its job id.
pub async fn submit_zip(app: &TestApp) -> String {
    let response = post_multipart(app, "/v1/reviews", zip_submission_body()).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    json["job_id"].as_str().expect("job_id").to_string()
}

/// Poll the status endpoint until the job reaches `expected`.
pub async fn wait_for_status(app: &TestApp, job_id: &str, expected: &str) -> serde_json::Value {
    for _ in 0..300 {
        let response = get(app, &format!("/v1/reviews/{}", job_id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        if json["status"] == expected {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never reached status {}", job_id, expected);
}
