use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info};
use worksync_core::{AccessToken, RemoteStore};

use super::ProjectId;
use super::engine::{EngineError, SyncEngine, delete_local_directory};
use super::scheduler::SessionScheduler;
use crate::config::EngineConfig;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("project {0} not found")]
    NotFound(ProjectId),
    #[error("catalog backend failed: {0}")]
    Backend(String),
}

/// Lookup of a project's remote root folder id, served by the embedding
/// persistence layer.
#[async_trait]
pub trait ProjectCatalog: Send + Sync {
    async fn remote_root_id(&self, project_id: ProjectId) -> Result<String, CatalogError>;
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("project {0} is already open")]
    AlreadyOpen(ProjectId),
    #[error("project {0} is not currently open")]
    NotOpen(ProjectId),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// The open binding of a project to its local working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub project_id: ProjectId,
    pub remote_root_id: String,
}

/// Owns the session registry and drives the lifecycle: open pulls the
/// project and starts the background schedule, save pushes on demand, close
/// pushes one last time and tears everything down. The registry enforces
/// exactly one open session per project.
pub struct SessionManager {
    engine: Arc<SyncEngine>,
    scheduler: SessionScheduler,
    catalog: Arc<dyn ProjectCatalog>,
    sessions: RwLock<HashMap<ProjectId, Session>>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        catalog: Arc<dyn ProjectCatalog>,
        config: &EngineConfig,
    ) -> Self {
        let engine = Arc::new(SyncEngine::new(store, config));
        let scheduler = SessionScheduler::new(Arc::clone(&engine), config.sync_interval);
        Self {
            engine,
            scheduler,
            catalog,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Resolves the remote root, pulls the whole project and starts the
    /// recurring push. The session is registered only once the pull
    /// succeeded; a failed pull leaves neither local files nor a registry
    /// entry behind. Returns the local working directory.
    pub async fn open(
        &self,
        credential: &AccessToken,
        project_id: ProjectId,
    ) -> Result<PathBuf, SessionError> {
        info!(project_id, "opening project");

        if self.sessions.read().await.contains_key(&project_id) {
            return Err(SessionError::AlreadyOpen(project_id));
        }

        let remote_root_id = self.catalog.remote_root_id(project_id).await?;
        let local_path = self.engine.project_root(project_id);

        if let Err(err) = self.engine.pull(credential, project_id, &remote_root_id).await {
            error!(project_id, %err, "pull failed, cleaning up remaining local files");
            delete_local_directory(&local_path)
                .await
                .map_err(EngineError::Io)?;
            return Err(err.into());
        }

        {
            let mut sessions = self.sessions.write().await;
            if sessions.contains_key(&project_id) {
                // Lost an open race after the pull; the winner owns the
                // directory.
                return Err(SessionError::AlreadyOpen(project_id));
            }
            sessions.insert(
                project_id,
                Session {
                    project_id,
                    remote_root_id: remote_root_id.clone(),
                },
            );
        }
        self.scheduler
            .start_scheduling(credential.clone(), project_id, remote_root_id)
            .await;

        info!(project_id, path = %local_path.display(), "project opened");
        Ok(local_path)
    }

    /// Manual push of the open session's local changes.
    pub async fn save(
        &self,
        credential: &AccessToken,
        project_id: ProjectId,
    ) -> Result<(), SessionError> {
        info!(project_id, "manual save triggered");
        let remote_root_id = self.session_root_id(project_id).await?;
        self.engine
            .push(credential, project_id, &remote_root_id)
            .await?;
        Ok(())
    }

    /// Final push, local teardown, deregistration. The scheduler is stopped
    /// before the push so a concurrently firing scheduled push cannot race
    /// it, and the session is removed from the registry even when the final
    /// push fails, so it can never become permanently stuck.
    pub async fn close(
        &self,
        credential: &AccessToken,
        project_id: ProjectId,
    ) -> Result<(), SessionError> {
        info!(project_id, "closing project");
        let remote_root_id = self.session_root_id(project_id).await?;

        self.scheduler.stop_scheduling(project_id).await;

        let result = self
            .engine
            .cleanup(credential, project_id, &remote_root_id)
            .await;
        self.sessions.write().await.remove(&project_id);
        result?;

        info!(project_id, "project closed");
        Ok(())
    }

    pub async fn is_open(&self, project_id: ProjectId) -> bool {
        self.sessions.read().await.contains_key(&project_id)
    }

    pub async fn open_projects(&self) -> Vec<ProjectId> {
        self.sessions.read().await.keys().copied().collect()
    }

    async fn session_root_id(&self, project_id: ProjectId) -> Result<String, SessionError> {
        self.sessions
            .read()
            .await
            .get(&project_id)
            .map(|session| session.remote_root_id.clone())
            .ok_or(SessionError::NotOpen(project_id))
    }
}
