//! Artifact persistence: write-once per-job output files.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::artifact::{ArtifactName, ArtifactRef};
use crate::domain::job::JobId;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactStoreError {
    #[error("Artifact {name} for job {job_id} already exists")]
    AlreadyExists { job_id: JobId, name: ArtifactName },

    #[error("Artifact {name} for job {job_id} not found")]
    NotFound { job_id: JobId, name: ArtifactName },

    #[error("Artifact I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Write-once blob storage keyed by (job, artifact name).
///
/// `put` returns the ref recorded on the job; the fixed [`ArtifactName`] enum
/// at the API boundary is what keeps traversal out of the key space.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(
        &self,
        job_id: &JobId,
        name: ArtifactName,
        bytes: Vec<u8>,
    ) -> Result<ArtifactRef, ArtifactStoreError>;

    async fn get(
        &self,
        job_id: &JobId,
        name: ArtifactName,
    ) -> Result<Vec<u8>, ArtifactStoreError>;

    async fn exists(&self, job_id: &JobId, name: ArtifactName) -> bool;

    /// Drop every artifact of a job. Used to discard the output of an
    /// attempt that lost its terminal CAS, so write-once holds per attempt
    /// rather than forever. Removing an absent job is not an error.
    async fn remove_all(&self, job_id: &JobId) -> Result<(), ArtifactStoreError>;
}

/// Filesystem store: `<root>/<job_id>/<artifact name>`.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn artifact_path(&self, job_id: &JobId, name: ArtifactName) -> PathBuf {
        self.root.join(job_id.as_str()).join(name.as_str())
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(
        &self,
        job_id: &JobId,
        name: ArtifactName,
        bytes: Vec<u8>,
    ) -> Result<ArtifactRef, ArtifactStoreError> {
        let path = self.artifact_path(job_id, name);
        if tokio::fs::try_exists(&path).await? {
            return Err(ArtifactStoreError::AlreadyExists {
                job_id: job_id.clone(),
                name,
            });
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let size_bytes = bytes.len() as u64;
        // Write to a sibling temp file, then rename: readers never observe a
        // partially written artifact.
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(job_id = %job_id, artifact = %name, size_bytes, "Artifact persisted");
        Ok(ArtifactRef { name, size_bytes })
    }

    async fn get(
        &self,
        job_id: &JobId,
        name: ArtifactName,
    ) -> Result<Vec<u8>, ArtifactStoreError> {
        let path = self.artifact_path(job_id, name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArtifactStoreError::NotFound {
                    job_id: job_id.clone(),
                    name,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, job_id: &JobId, name: ArtifactName) -> bool {
        tokio::fs::try_exists(self.artifact_path(job_id, name))
            .await
            .unwrap_or(false)
    }

    async fn remove_all(&self, job_id: &JobId) -> Result<(), ArtifactStoreError> {
        match tokio::fs::remove_dir_all(self.root.join(job_id.as_str())).await {
            Ok(()) => {
                debug!(job_id = %job_id, "Artifacts removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and embedded use.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    blobs: Arc<RwLock<HashMap<(JobId, ArtifactName), Vec<u8>>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(
        &self,
        job_id: &JobId,
        name: ArtifactName,
        bytes: Vec<u8>,
    ) -> Result<ArtifactRef, ArtifactStoreError> {
        let mut blobs = self.blobs.write().await;
        let key = (job_id.clone(), name);
        if blobs.contains_key(&key) {
            return Err(ArtifactStoreError::AlreadyExists {
                job_id: job_id.clone(),
                name,
            });
        }
        let size_bytes = bytes.len() as u64;
        blobs.insert(key, bytes);
        Ok(ArtifactRef { name, size_bytes })
    }

    async fn get(
        &self,
        job_id: &JobId,
        name: ArtifactName,
    ) -> Result<Vec<u8>, ArtifactStoreError> {
        self.blobs
            .read()
            .await
            .get(&(job_id.clone(), name))
            .cloned()
            .ok_or(ArtifactStoreError::NotFound {
                job_id: job_id.clone(),
                name,
            })
    }

    async fn exists(&self, job_id: &JobId, name: ArtifactName) -> bool {
        self.blobs.read().await.contains_key(&(job_id.clone(), name))
    }

    async fn remove_all(&self, job_id: &JobId) -> Result<(), ArtifactStoreError> {
        self.blobs.write().await.retain(|(id, _), _| id != job_id);
        Ok(())
    }
}

/// Store wrapper that fails every put after the first `allow` writes.
/// Test-only lever for exercising the mid-completion storage failure path.
#[cfg(test)]
pub struct FailingArtifactStore {
    inner: InMemoryArtifactStore,
    allow: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FailingArtifactStore {
    pub fn failing_after(allow: usize) -> Self {
        Self {
            inner: InMemoryArtifactStore::new(),
            allow: std::sync::atomic::AtomicUsize::new(allow),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ArtifactStore for FailingArtifactStore {
    async fn put(
        &self,
        job_id: &JobId,
        name: ArtifactName,
        bytes: Vec<u8>,
    ) -> Result<ArtifactRef, ArtifactStoreError> {
        use std::sync::atomic::Ordering;
        let remaining = self.allow.load(Ordering::SeqCst);
        if remaining == 0 {
            return Err(ArtifactStoreError::Io(std::io::Error::other(
                "injected write failure",
            )));
        }
        self.allow.store(remaining - 1, Ordering::SeqCst);
        self.inner.put(job_id, name, bytes).await
    }

    async fn get(
        &self,
        job_id: &JobId,
        name: ArtifactName,
    ) -> Result<Vec<u8>, ArtifactStoreError> {
        self.inner.get(job_id, name).await
    }

    async fn exists(&self, job_id: &JobId, name: ArtifactName) -> bool {
        self.inner.exists(job_id, name).await
    }

    async fn remove_all(&self, job_id: &JobId) -> Result<(), ArtifactStoreError> {
        self.inner.remove_all(job_id).await
    }
}
