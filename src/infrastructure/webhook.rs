//! Signed webhook delivery for terminal job events.
//!
//! Every terminal transition produces one notification per configured
//! subscription. The envelope is serialized exactly once and the HMAC is
//! computed over those transmitted bytes, so receivers can verify the
//! signature against the raw request body without re-serialization concerns.

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{SubscriptionConfig, WebhookConfig};
use crate::domain::artifact::ArtifactRef;
use crate::domain::job::{JobId, JobStatus, ReviewJob, ReviewSummary};

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_EVENT: &str = "X-Review-Event";
pub const HEADER_DELIVERY_ID: &str = "X-Delivery-Id";
pub const HEADER_SIGNATURE: &str = "X-Signature";

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Webhook payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Webhook HTTP client construction failed: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Webhook signing failed: {0}")]
    Signature(String),

    #[error("Job {0} is not in a terminal state")]
    NotTerminal(JobId),
}

/// The notification envelope POSTed to each subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ReviewSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<ArtifactRef>>,
}

impl WebhookEvent {
    /// Build the envelope for a job that reached a terminal state.
    pub fn for_job(job: &ReviewJob) -> Result<Self, WebhookError> {
        let event = match job.status {
            JobStatus::Completed => "review.completed",
            JobStatus::Failed => "review.failed",
            JobStatus::Canceled => "review.canceled",
            JobStatus::Queued | JobStatus::Running => {
                return Err(WebhookError::NotTerminal(job.id.clone()))
            }
        };
        Ok(Self {
            event: event.to_string(),
            job_id: job.id.clone(),
            status: job.status,
            summary: job.summary.clone(),
            artifacts: job.artifacts.clone(),
        })
    }
}

/// One delivery attempt, recorded append-only whatever the outcome.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryAttempt {
    pub job_id: JobId,
    pub endpoint: String,
    pub attempt_number: u32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// HTTP status of the response, absent when the request itself failed.
    pub http_status: Option<u16>,
    pub signature: String,
}

/// Append-only record of every delivery attempt.
#[derive(Clone, Default)]
pub struct DeliveryLog {
    attempts: Arc<RwLock<Vec<DeliveryAttempt>>>,
}

impl DeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, attempt: DeliveryAttempt) {
        self.attempts.write().await.push(attempt);
    }

    pub async fn snapshot(&self) -> Vec<DeliveryAttempt> {
        self.attempts.read().await.clone()
    }
}

/// Delivers signed terminal-event notifications with bounded retries.
pub struct WebhookDispatcher {
    client: Client,
    config: WebhookConfig,
    log: DeliveryLog,
}

impl WebhookDispatcher {
    pub fn new(config: WebhookConfig) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            config,
            log: DeliveryLog::new(),
        })
    }

    pub fn delivery_log(&self) -> DeliveryLog {
        self.log.clone()
    }

    /// Notify every subscription about a terminal job. Failures are retried
    /// up to the attempt cap and then dropped; the caller never blocks on
    /// delivery and the job outcome is unaffected.
    pub async fn notify(self: Arc<Self>, job: ReviewJob) {
        if self.config.subscriptions.is_empty() {
            return;
        }
        let event = match WebhookEvent::for_job(&job) {
            Ok(event) => event,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Skipping webhook notification");
                return;
            }
        };
        // Serialize once; the signature is over these exact bytes.
        let body = match serde_json::to_vec(&event) {
            Ok(body) => body,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Webhook envelope serialization failed");
                return;
            }
        };

        for subscription in self.config.subscriptions.clone() {
            let dispatcher = Arc::clone(&self);
            let event_name = event.event.clone();
            let job_id = job.id.clone();
            let body = body.clone();
            tokio::spawn(async move {
                dispatcher
                    .deliver(subscription, job_id, event_name, body)
                    .await;
            });
        }
    }

    async fn deliver(
        &self,
        subscription: SubscriptionConfig,
        job_id: JobId,
        event_name: String,
        body: Vec<u8>,
    ) {
        let signature = match sign(&subscription.secret, &body) {
            Ok(signature) => signature,
            Err(e) => {
                warn!(job_id = %job_id, endpoint = %subscription.url, error = %e,
                    "Webhook signing failed; delivery skipped");
                return;
            }
        };
        let delivery_id = delivery_id(&job_id, &subscription.url);

        for attempt in 1..=self.config.max_attempts {
            let response = self
                .client
                .post(&subscription.url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .header(HEADER_EVENT, &event_name)
                .header(HEADER_DELIVERY_ID, delivery_id.to_string())
                .header(HEADER_SIGNATURE, &signature)
                .body(body.clone())
                .send()
                .await;

            let http_status = match &response {
                Ok(response) => Some(response.status().as_u16()),
                Err(_) => None,
            };
            self.log
                .record(DeliveryAttempt {
                    job_id: job_id.clone(),
                    endpoint: subscription.url.clone(),
                    attempt_number: attempt,
                    timestamp: chrono::Utc::now(),
                    http_status,
                    signature: signature.clone(),
                })
                .await;

            match response {
                Ok(response) if response.status().is_success() => {
                    debug!(job_id = %job_id, endpoint = %subscription.url, attempt,
                        "Webhook delivered");
                    return;
                }
                Ok(response) => {
                    warn!(job_id = %job_id, endpoint = %subscription.url, attempt,
                        status = response.status().as_u16(), "Webhook delivery rejected");
                }
                Err(e) => {
                    warn!(job_id = %job_id, endpoint = %subscription.url, attempt,
                        error = %e, "Webhook delivery failed");
                }
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(self.backoff_delay(attempt)).await;
            }
        }
        warn!(job_id = %job_id, endpoint = %subscription.url,
            attempts = self.config.max_attempts, "Webhook delivery abandoned");
    }

    /// Exponential backoff after the n-th failed attempt, capped.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let millis = self
            .config
            .backoff_base_ms
            .saturating_mul(1u64 << exp)
            .min(self.config.backoff_max_ms);
        Duration::from_millis(millis)
    }
}

/// Hex-encoded HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::Signature(e.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Deterministic delivery id: UUIDv5 over (job id, endpoint), so retries of
/// the same notification carry the same id and receivers can deduplicate.
pub fn delivery_id(job_id: &JobId, endpoint: &str) -> Uuid {
    let material = format!("{}:{}", job_id, endpoint);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, material.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::submission::{MetaEnvelope, SubmissionMode};

    fn terminal_job(status: JobStatus) -> ReviewJob {
        let mut job = ReviewJob::new(
            SubmissionMode::Zip,
            MetaEnvelope::parse(r#"{"project": "demo"}"#).unwrap(),
            None,
            None,
        );
        job.transition(JobStatus::Running, None).unwrap();
        job.transition(status, None).unwrap();
        job
    }

    #[test]
    fn event_names_follow_terminal_status() {
        let completed = WebhookEvent::for_job(&terminal_job(JobStatus::Completed)).unwrap();
        assert_eq!(completed.event, "review.completed");

        let canceled = WebhookEvent::for_job(&terminal_job(JobStatus::Canceled)).unwrap();
        assert_eq!(canceled.event, "review.canceled");
    }

    #[test]
    fn non_terminal_jobs_produce_no_event() {
        let job = ReviewJob::new(
            SubmissionMode::Zip,
            MetaEnvelope::parse(r#"{"project": "demo"}"#).unwrap(),
            None,
            None,
        );
        assert!(matches!(
            WebhookEvent::for_job(&job),
            Err(WebhookError::NotTerminal(_))
        ));
    }

    #[test]
    fn signature_is_hex_and_keyed() {
        let a = sign("s3cret", b"payload").unwrap();
        let b = sign("s3cret", b"payload").unwrap();
        let c = sign("other", b"payload").unwrap();

        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, sign("s3cret", b"payload2").unwrap());
    }

    #[test]
    fn delivery_id_is_stable_per_job_and_endpoint() {
        let job_id = JobId::from_string("rev_01J0000000000000000000TEST");
        let a = delivery_id(&job_id, "https://ci.example.com/hook");
        let b = delivery_id(&job_id, "https://ci.example.com/hook");
        let c = delivery_id(&job_id, "https://other.example.com/hook");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let dispatcher = WebhookDispatcher::new(WebhookConfig {
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
            ..Default::default()
        })
        .unwrap();

        assert_eq!(dispatcher.backoff_delay(1), Duration::from_millis(500));
        assert_eq!(dispatcher.backoff_delay(2), Duration::from_millis(1_000));
        assert_eq!(dispatcher.backoff_delay(3), Duration::from_millis(2_000));
        assert_eq!(dispatcher.backoff_delay(12), Duration::from_millis(30_000));
    }
}
