use serde::{Deserialize, Serialize};

/// Metadata record of one remote file, keyed by its project-relative path.
///
/// `remote_id` is assigned by the remote store and stable for the life of the
/// file; `relative_path` joins ancestor folder names with `/`. `modified_at`
/// is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileDescriptor {
    pub remote_id: String,
    pub relative_path: String,
    pub content_hash: String,
    pub modified_at: i64,
    pub size: u64,
}

impl RemoteFileDescriptor {
    /// The same descriptor with only the modification time replaced. Used
    /// when local content turned out byte-identical and only the cached
    /// timestamp needs to move forward.
    pub fn touched(&self, modified_at: i64) -> Self {
        Self {
            modified_at,
            ..self.clone()
        }
    }
}
