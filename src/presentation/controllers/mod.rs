//! HTTP controllers

pub mod health;
pub mod reviews;

use std::path::PathBuf;
use std::sync::Arc;

use crate::application::JobOrchestrator;
use crate::config::LimitsConfig;
use crate::infrastructure::artifact_store::ArtifactStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<JobOrchestrator>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub limits: LimitsConfig,
    /// Where uploaded bundles are spooled before dispatch.
    pub spool_dir: PathBuf,
}
