//! FIFO job dispatch with bounded concurrency.
//!
//! Submissions enter a bounded queue of job ids. A single dispatch loop pops
//! them in order, claims each with a queued-to-running CAS, and runs claimed
//! jobs on worker tasks gated by a semaphore. Jobs canceled while queued lose
//! that CAS and their tokens are skipped; the queue never reorders and a job
//! is never requeued.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::reporting::render_report_artifacts;
use crate::application::workflow::JobWorkflow;
use crate::config::DispatchConfig;
use crate::domain::artifact::{ArtifactName, ArtifactRef};
use crate::domain::job::{JobError, JobId, ReviewJob};
use crate::domain::scan::ScanOutput;
use crate::domain::services::{ScanContext, ScanError, ScanWorker};
use crate::infrastructure::artifact_store::ArtifactStore;
use crate::infrastructure::job_repository::JobRepositoryError;

#[derive(Debug, thiserror::Error)]
#[error("Dispatch queue is full")]
pub struct QueueFull;

/// Sender half of the dispatch queue.
#[derive(Clone)]
pub struct DispatchQueue {
    sender: mpsc::Sender<JobId>,
}

/// A reserved queue slot. Reserving before creating the job record means a
/// saturated queue rejects the submission without leaving an orphan behind.
pub struct QueueSlot {
    permit: mpsc::OwnedPermit<JobId>,
}

impl DispatchQueue {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<JobId>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub fn try_reserve(&self) -> Result<QueueSlot, QueueFull> {
        self.sender
            .clone()
            .try_reserve_owned()
            .map(|permit| QueueSlot { permit })
            .map_err(|_| QueueFull)
    }
}

impl QueueSlot {
    pub fn send(self, job_id: JobId) {
        self.permit.send(job_id);
    }
}

/// Cancellation tokens for currently running jobs.
#[derive(Clone, Default)]
pub struct CancelRegistry {
    tokens: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, job_id: &JobId) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens
            .lock()
            .await
            .insert(job_id.clone(), token.clone());
        token
    }

    /// Signal the running job's token. Returns false when no token is
    /// registered, which happens when the job already finished.
    pub async fn cancel(&self, job_id: &JobId) -> bool {
        match self.tokens.lock().await.get(job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, job_id: &JobId) {
        self.tokens.lock().await.remove(job_id);
    }
}

/// Everything a dispatch worker task needs.
#[derive(Clone)]
pub struct DispatchContext {
    pub workflow: Arc<JobWorkflow>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub worker: Arc<dyn ScanWorker>,
    pub cancels: CancelRegistry,
    pub config: DispatchConfig,
}

/// Run the dispatch loop until shutdown or queue closure.
pub fn spawn_dispatch_pool(
    ctx: DispatchContext,
    mut receiver: mpsc::Receiver<JobId>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let semaphore = Arc::new(Semaphore::new(ctx.config.max_concurrent_jobs.max(1)));
        loop {
            let job_id = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = receiver.recv() => match next {
                    Some(job_id) => job_id,
                    None => break,
                },
            };
            // Hold the queue head until a slot frees up: jobs start strictly
            // in submission order.
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let job = match ctx.workflow.start_job(&job_id).await {
                Ok(job) => job,
                Err(JobRepositoryError::StaleStatus { actual, .. }) => {
                    debug!(job_id = %job_id, status = %actual, "Skipping stale queue token");
                    continue;
                }
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Failed to claim queued job");
                    continue;
                }
            };

            tokio::spawn(run_job(ctx.clone(), job, permit));
        }
        info!("Dispatch loop stopped");
    })
}

/// Drive one claimed job to a terminal state.
///
/// The scan plus persistence future runs under the hard wall-clock timeout.
/// An external cancel flips the status first (via the orchestrator CAS), so
/// here it only needs to give the worker a grace window before abandoning it.
async fn run_job(ctx: DispatchContext, job: ReviewJob, permit: OwnedSemaphorePermit) {
    let job_id = job.id.clone();
    let cancel = ctx.cancels.register(&job_id).await;

    let work = execute(&ctx, job, cancel.clone());
    tokio::pin!(work);

    tokio::select! {
        outcome = tokio::time::timeout(ctx.config.job_timeout(), &mut work) => {
            if outcome.is_err() {
                warn!(job_id = %job_id, timeout_seconds = ctx.config.job_timeout_seconds,
                    "Job exceeded wall-clock timeout");
                cancel.cancel();
                match ctx.workflow.fail_job(&job_id, JobError::timeout("job timed out")).await {
                    Ok(_) => {}
                    Err(JobRepositoryError::StaleStatus { actual, .. }) => {
                        debug!(job_id = %job_id, status = %actual,
                            "Timeout lost the transition race");
                    }
                    Err(e) => error!(job_id = %job_id, error = %e, "Failed to record timeout"),
                }
            }
        }
        _ = cancel.cancelled() => {
            debug!(job_id = %job_id, "Cancellation signaled; entering grace period");
            if tokio::time::timeout(ctx.config.cancel_grace(), &mut work).await.is_err() {
                warn!(job_id = %job_id, grace_seconds = ctx.config.cancel_grace_seconds,
                    "Worker ignored cancellation; abandoning attempt");
            }
        }
    }

    ctx.cancels.remove(&job_id).await;
    drop(permit);
}

async fn execute(ctx: &DispatchContext, job: ReviewJob, cancel: CancellationToken) {
    let job_id = job.id.clone();
    let context = ScanContext {
        job_id: job_id.clone(),
        mode: job.mode,
        bundle: job.bundle.clone(),
        sftp: job.sftp.clone(),
        meta: job.meta.clone(),
    };

    match ctx.worker.scan(context, cancel.clone()).await {
        Ok(output) => {
            // The worker may finish inside the cancel grace window without
            // ever looking at the token. Its output must not reach the store.
            if cancel.is_cancelled() {
                debug!(job_id = %job_id, "Scan finished after cancellation; output discarded");
                return;
            }
            let refs = match persist_artifacts(ctx, &job_id, &output).await {
                Ok(refs) => refs,
                Err(e) => {
                    // Leave the job running with whatever artifacts landed;
                    // the wall-clock timeout fails it. Readers never see a
                    // completed status backed by a partial artifact set.
                    error!(job_id = %job_id, error = %e,
                        "Artifact persistence failed; holding job for timeout");
                    std::future::pending::<()>().await;
                    unreachable!();
                }
            };
            match ctx.workflow.complete_job(&job_id, output.summary(), refs).await {
                Ok(_) => {}
                Err(JobRepositoryError::StaleStatus { actual, .. }) => {
                    debug!(job_id = %job_id, status = %actual,
                        "Scan result discarded; job already terminal");
                    // A cancel won between persistence and the CAS; the
                    // artifacts belong to the discarded attempt.
                    if let Err(e) = ctx.artifacts.remove_all(&job_id).await {
                        warn!(job_id = %job_id, error = %e,
                            "Failed to discard artifacts of a stale attempt");
                    }
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Failed to record completion");
                }
            }
        }
        Err(ScanError::Canceled) => {
            debug!(job_id = %job_id, "Worker stopped on cancellation signal");
        }
        Err(ScanError::Fatal(message)) => {
            // Best effort: keep the worker's last words around for operators.
            // The job's artifact list stays null on failure.
            if let Err(e) = ctx
                .artifacts
                .put(&job_id, ArtifactName::WorkerLog, message.clone().into_bytes())
                .await
            {
                debug!(job_id = %job_id, error = %e, "Could not persist failure log");
            }
            match ctx.workflow.fail_job(&job_id, JobError::worker(message)).await {
                Ok(_) => {}
                Err(JobRepositoryError::StaleStatus { actual, .. }) => {
                    debug!(job_id = %job_id, status = %actual,
                        "Worker failure discarded; job already terminal");
                }
                Err(e) => error!(job_id = %job_id, error = %e, "Failed to record worker failure"),
            }
        }
    }
}

/// Write the complete artifact set before the completion CAS runs.
async fn persist_artifacts(
    ctx: &DispatchContext,
    job_id: &JobId,
    output: &ScanOutput,
) -> Result<Vec<ArtifactRef>, String> {
    let rendered = render_report_artifacts(job_id, output).map_err(|e| e.to_string())?;
    let mut refs = Vec::with_capacity(rendered.len());
    for (name, bytes) in rendered {
        let artifact = ctx
            .artifacts
            .put(job_id, name, bytes)
            .await
            .map_err(|e| e.to_string())?;
        refs.push(artifact);
    }
    Ok(refs)
}
