//! Reviewd - Asynchronous code review job service
//!
//! Accepts code submissions over HTTP, runs them through a pluggable scan
//! worker under bounded concurrency, persists a fixed set of report
//! artifacts, and notifies subscribers with HMAC-signed webhooks when jobs
//! reach a terminal state.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── presentation/     # HTTP layer
//! │   ├── controllers/  # Request handlers
//! │   ├── models.rs     # DTOs with OpenAPI schemas
//! │   └── routes.rs     # API route definitions
//! ├── application/      # Use cases
//! │   ├── orchestrator.rs  # Submission intake, cancel, query
//! │   ├── workflow.rs      # CAS transition control + webhook fan-out
//! │   └── reporting/       # SARIF / Markdown / HTML renderers
//! ├── infrastructure/   # Persistence and delivery
//! │   ├── job_repository.rs  # Job records, compare-and-swap transitions
//! │   ├── artifact_store.rs  # Write-once artifact storage
//! │   ├── dispatch.rs        # FIFO queue + bounded worker pool
//! │   └── webhook.rs         # Signed delivery with retries
//! └── domain/           # Job, submission, artifact, scan models
//! ```
//!
//! # API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/v1/reviews` | POST | Submit code for review |
//! | `/v1/reviews/{job_id}` | GET | Get job status |
//! | `/v1/reviews/{job_id}/cancel` | POST | Cancel a queued or running job |
//! | `/v1/reviews/{job_id}/artifacts/{name}` | GET | Download an artifact |
//! | `/health` | GET | Health check |

pub mod app;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;
pub mod presentation;

pub use app::{AppError, AppHandle, create_app, create_app_with};
pub use config::Config;
pub use logging::init_tracing;
