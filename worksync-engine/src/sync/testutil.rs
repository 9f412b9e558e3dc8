use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use worksync_core::{AccessToken, RemoteFileDescriptor, RemoteStore, RemoteStoreError};

use super::ProjectId;
use super::session::{CatalogError, ProjectCatalog};

#[derive(Default)]
pub struct CallCounters {
    pub list: AtomicUsize,
    pub upload: AtomicUsize,
    pub download: AtomicUsize,
    pub delete: AtomicUsize,
    pub ensure_folder: AtomicUsize,
}

/// In-memory remote store with programmable per-path failures and call
/// counters. Uploads record the parent id they were dispatched with so tests
/// can assert folder resolution happened first.
#[derive(Default)]
pub struct MockRemoteStore {
    files: Mutex<HashMap<String, (RemoteFileDescriptor, Vec<u8>)>>,
    next_id: AtomicU64,
    fail_uploads: Mutex<HashSet<String>>,
    fail_downloads: Mutex<HashSet<String>>,
    uploaded_parents: Mutex<HashMap<String, Option<String>>>,
    pub calls: CallCounters,
}

impl MockRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_file(
        &self,
        relative_path: &str,
        content: &[u8],
        modified_at: i64,
    ) -> RemoteFileDescriptor {
        let remote_id = self.allocate_id();
        let descriptor = RemoteFileDescriptor {
            remote_id: remote_id.clone(),
            relative_path: relative_path.to_string(),
            content_hash: format!("{:x}", md5::compute(content)),
            modified_at,
            size: content.len() as u64,
        };
        self.files
            .lock()
            .unwrap()
            .insert(remote_id, (descriptor.clone(), content.to_vec()));
        descriptor
    }

    pub fn fail_upload(&self, relative_path: &str) {
        self.fail_uploads
            .lock()
            .unwrap()
            .insert(relative_path.to_string());
    }

    pub fn fail_download(&self, relative_path: &str) {
        self.fail_downloads
            .lock()
            .unwrap()
            .insert(relative_path.to_string());
    }

    pub fn file_by_path(&self, relative_path: &str) -> Option<RemoteFileDescriptor> {
        self.files
            .lock()
            .unwrap()
            .values()
            .find(|(descriptor, _)| descriptor.relative_path == relative_path)
            .map(|(descriptor, _)| descriptor.clone())
    }

    pub fn parent_id_for(&self, relative_path: &str) -> Option<String> {
        self.uploaded_parents
            .lock()
            .unwrap()
            .get(relative_path)
            .cloned()
            .flatten()
    }

    fn allocate_id(&self) -> String {
        format!("remote-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn list_files_recursively(
        &self,
        _credential: &AccessToken,
        _root_id: &str,
    ) -> Result<Vec<RemoteFileDescriptor>, RemoteStoreError> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .files
            .lock()
            .unwrap()
            .values()
            .map(|(descriptor, _)| descriptor.clone())
            .collect())
    }

    async fn upload_file(
        &self,
        _credential: &AccessToken,
        local_path: &Path,
        relative_path: &str,
        parent_id: Option<&str>,
        existing_remote_id: Option<&str>,
    ) -> Result<RemoteFileDescriptor, RemoteStoreError> {
        self.calls.upload.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.lock().unwrap().contains(relative_path) {
            return Err(RemoteStoreError::Api {
                status: 500,
                message: format!("upload rejected for {relative_path}"),
            });
        }

        let content = tokio::fs::read(local_path).await?;
        self.uploaded_parents
            .lock()
            .unwrap()
            .insert(relative_path.to_string(), parent_id.map(str::to_string));

        let remote_id = match existing_remote_id {
            Some(id) => id.to_string(),
            None => self.allocate_id(),
        };
        let descriptor = RemoteFileDescriptor {
            remote_id: remote_id.clone(),
            relative_path: relative_path.to_string(),
            content_hash: format!("{:x}", md5::compute(&content)),
            modified_at: now_ms(),
            size: content.len() as u64,
        };
        self.files
            .lock()
            .unwrap()
            .insert(remote_id, (descriptor.clone(), content));
        Ok(descriptor)
    }

    async fn download_file(
        &self,
        _credential: &AccessToken,
        remote_id: &str,
        destination: &Path,
    ) -> Result<(), RemoteStoreError> {
        self.calls.download.fetch_add(1, Ordering::SeqCst);
        let (descriptor, content) = self
            .files
            .lock()
            .unwrap()
            .get(remote_id)
            .cloned()
            .ok_or_else(|| RemoteStoreError::NotFound(remote_id.to_string()))?;
        if self
            .fail_downloads
            .lock()
            .unwrap()
            .contains(&descriptor.relative_path)
        {
            return Err(RemoteStoreError::Transport(format!(
                "download aborted for {}",
                descriptor.relative_path
            )));
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(destination, content).await?;
        Ok(())
    }

    async fn delete_file(
        &self,
        _credential: &AccessToken,
        remote_id: &str,
    ) -> Result<(), RemoteStoreError> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .remove(remote_id)
            .map(drop)
            .ok_or_else(|| RemoteStoreError::NotFound(remote_id.to_string()))
    }

    async fn ensure_folder_path(
        &self,
        _credential: &AccessToken,
        root_id: &str,
        relative_path: &str,
    ) -> Result<String, RemoteStoreError> {
        self.calls.ensure_folder.fetch_add(1, Ordering::SeqCst);
        match relative_path.rsplit_once('/') {
            Some((folder, _)) => Ok(format!("folder:{folder}")),
            None => Ok(root_id.to_string()),
        }
    }
}

#[derive(Default)]
pub struct MockCatalog {
    roots: Mutex<HashMap<ProjectId, String>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(project_id: ProjectId, remote_root_id: &str) -> Self {
        let catalog = Self::new();
        catalog
            .roots
            .lock()
            .unwrap()
            .insert(project_id, remote_root_id.to_string());
        catalog
    }
}

#[async_trait]
impl ProjectCatalog for MockCatalog {
    async fn remote_root_id(&self, project_id: ProjectId) -> Result<String, CatalogError> {
        self.roots
            .lock()
            .unwrap()
            .get(&project_id)
            .cloned()
            .ok_or(CatalogError::NotFound(project_id))
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}
