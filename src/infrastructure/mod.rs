//! Infrastructure: persistence contracts, dispatch machinery, webhook delivery.

pub mod artifact_store;
pub mod dispatch;
pub mod job_repository;
pub mod webhook;
pub mod worker;

pub use artifact_store::{ArtifactStore, ArtifactStoreError, FsArtifactStore, InMemoryArtifactStore};
pub use dispatch::{
    spawn_dispatch_pool, CancelRegistry, DispatchContext, DispatchQueue, QueueFull, QueueSlot,
};
pub use job_repository::{InMemoryJobRepository, JobRepository, JobRepositoryError, TransitionPayload};
pub use webhook::{DeliveryAttempt, DeliveryLog, WebhookDispatcher, WebhookError, WebhookEvent};
pub use worker::NoopScanWorker;
