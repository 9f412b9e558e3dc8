use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::credential::AccessToken;
use crate::descriptor::RemoteFileDescriptor;

#[derive(Debug, Error)]
pub enum RemoteStoreError {
    #[error("remote api returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("remote transport failed: {0}")]
    Transport(String),
    #[error("remote file not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

impl RemoteStoreError {
    pub fn classification(&self) -> RemoteErrorClass {
        match self {
            RemoteStoreError::Api { status, .. } => classify_api_status(*status),
            RemoteStoreError::Transport(_) | RemoteStoreError::Io(_) => RemoteErrorClass::Transient,
            RemoteStoreError::NotFound(_) => RemoteErrorClass::Permanent,
        }
    }

    /// True when the failure signals the remote side being unreachable or
    /// refusing service (network, throttling, credentials), as opposed to a
    /// problem with the request itself.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self.classification(),
            RemoteErrorClass::Auth | RemoteErrorClass::RateLimit | RemoteErrorClass::Transient
        )
    }
}

fn classify_api_status(status: u16) -> RemoteErrorClass {
    match status {
        401 | 403 => RemoteErrorClass::Auth,
        429 => RemoteErrorClass::RateLimit,
        408 | 409 | 425 => RemoteErrorClass::Transient,
        status if status >= 500 => RemoteErrorClass::Transient,
        _ => RemoteErrorClass::Permanent,
    }
}

/// Cloud storage operations the sync engine consumes. Implemented outside the
/// engine by the concrete storage client; everything here is addressed either
/// by a store-assigned id or by a project-relative `/`-joined path.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Every file under `root_id`, in no particular order, with relative
    /// paths built by joining ancestor folder names with `/`. Folder entries
    /// themselves are not returned.
    async fn list_files_recursively(
        &self,
        credential: &AccessToken,
        root_id: &str,
    ) -> Result<Vec<RemoteFileDescriptor>, RemoteStoreError>;

    /// Uploads `local_path`. A `None` existing id creates a new file under
    /// `parent_id`; `Some` updates that file in place and `parent_id` is
    /// ignored. Returns the resulting descriptor.
    async fn upload_file(
        &self,
        credential: &AccessToken,
        local_path: &Path,
        relative_path: &str,
        parent_id: Option<&str>,
        existing_remote_id: Option<&str>,
    ) -> Result<RemoteFileDescriptor, RemoteStoreError>;

    /// Writes the file's bytes to `destination`, creating parent directories
    /// as needed.
    async fn download_file(
        &self,
        credential: &AccessToken,
        remote_id: &str,
        destination: &Path,
    ) -> Result<(), RemoteStoreError>;

    /// Soft-delete is acceptable.
    async fn delete_file(
        &self,
        credential: &AccessToken,
        remote_id: &str,
    ) -> Result<(), RemoteStoreError>;

    /// Creates any missing intermediate folders for `relative_path` under
    /// `root_id` and returns the id of the file's immediate parent folder.
    async fn ensure_folder_path(
        &self,
        credential: &AccessToken,
        root_id: &str,
        relative_path: &str,
    ) -> Result<String, RemoteStoreError>;
}
