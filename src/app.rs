//! Application setup and wiring

use std::sync::Arc;

use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::application::{JobOrchestrator, JobWorkflow};
use crate::config::Config;
use crate::domain::services::ScanWorker;
use crate::infrastructure::artifact_store::{ArtifactStore, FsArtifactStore};
use crate::infrastructure::dispatch::{
    CancelRegistry, DispatchContext, DispatchQueue, spawn_dispatch_pool,
};
use crate::infrastructure::job_repository::{InMemoryJobRepository, JobRepository};
use crate::infrastructure::webhook::{WebhookDispatcher, WebhookError};
use crate::infrastructure::worker::NoopScanWorker;
use crate::presentation::controllers::AppState;
use crate::presentation::routes::create_router;

/// Handle returned from create_app for graceful shutdown coordination
pub struct AppHandle {
    pub router: Router,
    pub shutdown_token: CancellationToken,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Webhook dispatcher setup failed: {0}")]
    Webhook(#[from] WebhookError),
}

/// Build the application with the default in-process stack: filesystem
/// artifact storage and the noop scan worker.
pub async fn create_app(config: Config) -> Result<AppHandle, AppError> {
    let artifacts: Arc<dyn ArtifactStore> =
        Arc::new(FsArtifactStore::new(&config.storage.artifact_root));
    create_app_with(config, Arc::new(NoopScanWorker), artifacts).await
}

/// Build the application around a caller-supplied scan engine and artifact
/// store. This is the embedding seam: hosts plug their engine in here.
pub async fn create_app_with(
    config: Config,
    worker: Arc<dyn ScanWorker>,
    artifacts: Arc<dyn ArtifactStore>,
) -> Result<AppHandle, AppError> {
    let config = Arc::new(config);

    let repository: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
    let webhooks = Arc::new(WebhookDispatcher::new(config.webhook.clone())?);
    let workflow = Arc::new(JobWorkflow::new(Arc::clone(&repository), webhooks));
    let cancels = CancelRegistry::new();
    let (queue, receiver) = DispatchQueue::bounded(config.limits.queue_capacity);

    let shutdown_token = CancellationToken::new();
    spawn_dispatch_pool(
        DispatchContext {
            workflow: Arc::clone(&workflow),
            artifacts: Arc::clone(&artifacts),
            worker,
            cancels: cancels.clone(),
            config: config.dispatch.clone(),
        },
        receiver,
        shutdown_token.clone(),
    );

    let orchestrator = Arc::new(JobOrchestrator::new(
        repository,
        workflow,
        queue,
        cancels,
        config.limits.clone(),
    ));

    let state = AppState {
        orchestrator,
        artifacts,
        limits: config.limits.clone(),
        spool_dir: config.storage.artifact_root.join("_spool"),
    };

    Ok(AppHandle {
        router: create_router(state, config),
        shutdown_token,
    })
}
