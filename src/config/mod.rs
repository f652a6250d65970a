//! Configuration management

pub mod validation;

pub use validation::{Validate, ValidationError};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub dispatch: DispatchConfig,
    pub webhook: WebhookConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Whether to expose interactive API docs (Swagger UI). Should be false in hardened production.
    pub enable_docs: bool,
    /// Global request timeout in seconds applied at the HTTP layer.
    pub request_timeout_seconds: u64,
    /// Allowed CORS origins. Use ["*"] to allow any (development only).
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            enable_docs: true,
            request_timeout_seconds: 30,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Submission limits and backpressure configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Byte ceiling for an uploaded code bundle. Larger submissions are rejected with 413.
    pub max_bundle_bytes: u64,
    /// Maximum number of jobs allowed in queued or running state at once.
    /// Submissions beyond this are rejected with 429.
    pub max_in_flight_jobs: usize,
    /// Dispatch queue capacity. A saturated queue rejects further submissions with 429.
    pub queue_capacity: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_bundle_bytes: 50 * 1024 * 1024,
            max_in_flight_jobs: 64,
            queue_capacity: 256,
        }
    }
}

/// Worker dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Global ceiling on concurrently running jobs.
    pub max_concurrent_jobs: usize,
    /// Hard wall-clock timeout per job, in seconds.
    pub job_timeout_seconds: u64,
    /// Grace period after a cancellation signal before the worker attempt is force-abandoned.
    pub cancel_grace_seconds: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            job_timeout_seconds: 600,
            cancel_grace_seconds: 10,
        }
    }
}

impl DispatchConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_seconds)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_seconds)
    }
}

/// A single webhook subscription, configured out of band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Endpoint URL to POST events to.
    pub url: String,
    /// Shared secret for HMAC-SHA256 signatures.
    pub secret: String,
}

/// Webhook delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Per-attempt HTTP timeout in seconds, independent of the job timeout.
    pub request_timeout_seconds: u64,
    /// Maximum delivery attempts per (job, endpoint) before giving up.
    pub max_attempts: u32,
    /// Initial backoff delay between attempts, in milliseconds. Doubles per attempt.
    pub backoff_base_ms: u64,
    /// Upper bound on the backoff delay, in milliseconds.
    pub backoff_max_ms: u64,
    /// Subscribed endpoints.
    pub subscriptions: Vec<SubscriptionConfig>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
            max_attempts: 5,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
            subscriptions: Vec::new(),
        }
    }
}

impl WebhookConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Artifact storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for persisted job artifacts.
    pub artifact_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            artifact_root: PathBuf::from(".reviewd_artifacts"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.limits.validate()?;
        self.dispatch.validate()?;
        self.webhook.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        // Add environment-specific config if ENV is set
        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        // Add local config and environment variables last (highest priority)
        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("REVIEWD").separator("__"));

        let config: Config = builder.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}
