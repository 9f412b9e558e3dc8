use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use worksync_core::{AccessToken, RemoteFileDescriptor, RemoteStore, RemoteStoreError};

use super::ProjectId;
use super::cache::SyncStateCache;
use super::paths::{PathError, local_path_for};
use super::planner::{DeleteTask, PlanError, PushPlan, TransferTask, plan_push, walk_local_files};
use crate::config::EngineConfig;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("remote store error: {0}")]
    Remote(#[from] RemoteStoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("path error: {0}")]
    Path(#[from] PathError),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Batch(#[from] BatchError),
}

impl EngineError {
    /// True when the failure traces back to the remote side being
    /// unreachable or refusing service, rather than to this machine.
    pub fn remote_unavailable(&self) -> bool {
        match self {
            EngineError::Remote(err) => err.is_unavailable(),
            EngineError::Batch(batch) => batch.remote_unavailable(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Upload,
    Download,
    Delete,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskKind::Upload => "upload",
            TaskKind::Download => "download",
            TaskKind::Delete => "delete",
        })
    }
}

/// One task's failure inside a batch. Collected and aggregated; never fatal
/// to sibling tasks.
#[derive(Debug, Clone)]
pub struct TransferFailure {
    pub kind: TaskKind,
    pub relative_path: String,
    pub message: String,
    pub remote_unavailable: bool,
}

impl TransferFailure {
    fn from_store(kind: TaskKind, relative_path: &str, err: &RemoteStoreError) -> Self {
        Self {
            kind,
            relative_path: relative_path.to_string(),
            message: err.to_string(),
            remote_unavailable: err.is_unavailable(),
        }
    }

    fn local(kind: TaskKind, relative_path: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            relative_path: relative_path.to_string(),
            message: message.into(),
            remote_unavailable: false,
        }
    }
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.relative_path, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOperation {
    Pull,
    Push,
}

impl fmt::Display for BatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BatchOperation::Pull => "pull",
            BatchOperation::Push => "push",
        })
    }
}

/// Aggregate error for a batch, naming every failed task. Tasks that
/// succeeded keep their cache updates.
#[derive(Debug)]
pub struct BatchError {
    pub operation: BatchOperation,
    pub failures: Vec<TransferFailure>,
}

impl BatchError {
    pub fn remote_unavailable(&self) -> bool {
        self.failures.iter().any(|failure| failure.remote_unavailable)
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed for {} task(s):",
            self.operation,
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}

/// Mirrors a project between the remote store and its local working
/// directory: full pull on open, diff-based push during the session, final
/// push plus teardown on close. Transfers within one batch run concurrently
/// on a worker pool shared across all of this engine's batches.
pub struct SyncEngine {
    store: Arc<dyn RemoteStore>,
    cache: SyncStateCache,
    local_root: PathBuf,
    workers: Arc<Semaphore>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn RemoteStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            cache: SyncStateCache::new(),
            local_root: config.local_root.clone(),
            workers: Arc::new(Semaphore::new(config.worker_concurrency.max(1))),
        }
    }

    /// The project's local working directory: one directory per project under
    /// the fixed root, removed recursively on close.
    pub fn project_root(&self, project_id: ProjectId) -> PathBuf {
        self.local_root.join(project_id.to_string())
    }

    pub fn cache(&self) -> &SyncStateCache {
        &self.cache
    }

    /// Full download of the project into its local directory. The cache is
    /// populated only after the entire batch succeeded; a partial pull leaves
    /// it untouched and the caller removes the partial directory.
    pub async fn pull(
        &self,
        credential: &AccessToken,
        project_id: ProjectId,
        remote_root_id: &str,
    ) -> Result<usize, EngineError> {
        info!(project_id, "pull started");

        // Metadata first, so the downloads can run in parallel afterwards.
        let descriptors = self
            .store
            .list_files_recursively(credential, remote_root_id)
            .await?;

        // Every directory is created before the parallel phase; concurrent
        // downloads never race on create_dir_all.
        let project_root = self.project_root(project_id);
        tokio::fs::create_dir_all(&project_root).await?;
        let mut targets = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let target = local_path_for(&project_root, &descriptor.relative_path)?;
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            targets.push(target);
        }

        let downloads = descriptors
            .iter()
            .zip(&targets)
            .map(|(descriptor, target)| self.run_download(credential, descriptor, target));
        let failures: Vec<TransferFailure> = join_all(downloads)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();
        if !failures.is_empty() {
            return Err(BatchError {
                operation: BatchOperation::Pull,
                failures,
            }
            .into());
        }

        let count = descriptors.len();
        for descriptor in descriptors {
            self.cache.put(project_id, descriptor).await;
        }

        info!(project_id, files = count, "pull finished");
        Ok(count)
    }

    /// Diff-based upload of local changes, sharing one worker batch between
    /// uploads and deletes. Each task commits its own cache update on
    /// success; a sibling's failure cannot undo it. At least one failed task
    /// surfaces as a single aggregate error naming every failure.
    pub async fn push(
        &self,
        credential: &AccessToken,
        project_id: ProjectId,
        remote_root_id: &str,
    ) -> Result<(), EngineError> {
        let project_root = self.project_root(project_id);
        if !tokio::fs::try_exists(&project_root).await? {
            warn!(project_id, "local project directory not found, skipping push");
            return Ok(());
        }

        let snapshot = self.cache.snapshot(project_id).await;
        let plan = {
            let root = project_root.clone();
            tokio::task::spawn_blocking(move || -> Result<PushPlan, PlanError> {
                let local_files = walk_local_files(&root)?;
                plan_push(&root, &local_files, &snapshot)
            })
            .await??
        };

        let touched = plan.touches.len();
        for descriptor in &plan.touches {
            self.cache.put(project_id, descriptor.clone()).await;
        }

        if !plan.has_transfers() {
            debug!(project_id, touched, "push found no changes");
            return Ok(());
        }

        // Folder resolution is sequential on purpose: concurrent ensure
        // calls for one new path would race and create duplicate folders.
        let mut uploads = Vec::with_capacity(plan.uploads.len());
        for mut task in plan.uploads {
            if task.remote_id.is_none() {
                let parent_id = self
                    .store
                    .ensure_folder_path(credential, remote_root_id, &task.relative_path)
                    .await?;
                task.parent_id = Some(parent_id);
            }
            uploads.push(task);
        }

        let uploaded = uploads.len();
        let deleted = plan.deletes.len();

        let mut batch: Vec<BoxFuture<'_, Result<(), TransferFailure>>> =
            Vec::with_capacity(uploaded + deleted);
        for task in &uploads {
            batch.push(self.run_upload(credential, project_id, task).boxed());
        }
        for task in &plan.deletes {
            batch.push(self.run_delete(credential, project_id, task).boxed());
        }

        let failures: Vec<TransferFailure> = join_all(batch)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();
        if !failures.is_empty() {
            return Err(BatchError {
                operation: BatchOperation::Push,
                failures,
            }
            .into());
        }

        info!(
            project_id,
            uploaded,
            deleted,
            touched,
            hashed = plan.hashed,
            "push finished"
        );
        Ok(())
    }

    /// Final push, then local teardown and cache drop. A failed push leaves
    /// the working directory and cache in place (the directory may hold the
    /// only copy of unsaved work); deregistration is the caller's concern.
    pub async fn cleanup(
        &self,
        credential: &AccessToken,
        project_id: ProjectId,
        remote_root_id: &str,
    ) -> Result<(), EngineError> {
        info!(project_id, "cleaning up project");

        self.push(credential, project_id, remote_root_id).await?;
        delete_local_directory(&self.project_root(project_id)).await?;
        self.cache.clear(project_id).await;

        info!(project_id, "cleanup complete");
        Ok(())
    }

    async fn run_download(
        &self,
        credential: &AccessToken,
        descriptor: &RemoteFileDescriptor,
        target: &Path,
    ) -> Result<(), TransferFailure> {
        let _permit = self.workers.acquire().await.map_err(|_| {
            TransferFailure::local(
                TaskKind::Download,
                &descriptor.relative_path,
                "worker pool is closed",
            )
        })?;

        // Some backends cannot serve media downloads for empty objects, so a
        // zero-byte remote file is just created locally.
        if descriptor.size == 0 {
            return tokio::fs::File::create(target).await.map(drop).map_err(|err| {
                TransferFailure::local(TaskKind::Download, &descriptor.relative_path, err.to_string())
            });
        }

        self.store
            .download_file(credential, &descriptor.remote_id, target)
            .await
            .map_err(|err| {
                TransferFailure::from_store(TaskKind::Download, &descriptor.relative_path, &err)
            })
    }

    async fn run_upload(
        &self,
        credential: &AccessToken,
        project_id: ProjectId,
        task: &TransferTask,
    ) -> Result<(), TransferFailure> {
        let _permit = self.workers.acquire().await.map_err(|_| {
            TransferFailure::local(TaskKind::Upload, &task.relative_path, "worker pool is closed")
        })?;

        let descriptor = self
            .store
            .upload_file(
                credential,
                &task.local_path,
                &task.relative_path,
                task.parent_id.as_deref(),
                task.remote_id.as_deref(),
            )
            .await
            .map_err(|err| TransferFailure::from_store(TaskKind::Upload, &task.relative_path, &err))?;

        self.cache.put(project_id, descriptor).await;
        Ok(())
    }

    async fn run_delete(
        &self,
        credential: &AccessToken,
        project_id: ProjectId,
        task: &DeleteTask,
    ) -> Result<(), TransferFailure> {
        let _permit = self.workers.acquire().await.map_err(|_| {
            TransferFailure::local(TaskKind::Delete, &task.relative_path, "worker pool is closed")
        })?;

        self.store
            .delete_file(credential, &task.remote_id)
            .await
            .map_err(|err| TransferFailure::from_store(TaskKind::Delete, &task.relative_path, &err))?;

        self.cache.remove(project_id, &task.relative_path).await;
        Ok(())
    }
}

pub(crate) async fn delete_local_directory(path: &Path) -> Result<(), std::io::Error> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(());
    }
    if let Err(err) = tokio::fs::remove_dir_all(path).await {
        error!(path = %path.display(), %err, "local project deletion failed");
        return Err(err);
    }
    Ok(())
}
