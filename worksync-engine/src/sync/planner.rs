use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use thiserror::Error;
use worksync_core::RemoteFileDescriptor;

use super::paths::{PathError, relative_path_of};

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("path error: {0}")]
    Path(#[from] PathError),
}

/// One planned upload. A `None` remote id means the file does not exist
/// remotely yet; `parent_id` is resolved just before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    pub local_path: PathBuf,
    pub relative_path: String,
    pub remote_id: Option<String>,
    pub parent_id: Option<String>,
}

/// One planned remote deletion, resolved from the cache snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTask {
    pub relative_path: String,
    pub remote_id: String,
}

#[derive(Debug, Default)]
pub struct PushPlan {
    pub uploads: Vec<TransferTask>,
    pub deletes: Vec<DeleteTask>,
    /// Descriptors whose cached modified_at should move forward because the
    /// local content turned out byte-identical. No transfer is issued.
    pub touches: Vec<RemoteFileDescriptor>,
    /// How many files had to be hashed this pass.
    pub hashed: usize,
}

impl PushPlan {
    pub fn has_transfers(&self) -> bool {
        !self.uploads.is_empty() || !self.deletes.is_empty()
    }
}

/// Diffs the local file walk against a cache snapshot.
///
/// Per local file: absent from the snapshot means a create upload; an mtime
/// at or before the cached one means skip without hashing; a newer mtime
/// with a matching hash means a timestamp-only touch; anything else is an
/// update upload carrying the existing remote id. Every snapshot path absent
/// from the walk becomes a delete task.
pub fn plan_push(
    project_root: &Path,
    local_files: &[PathBuf],
    snapshot: &HashMap<String, RemoteFileDescriptor>,
) -> Result<PushPlan, PlanError> {
    let mut plan = PushPlan::default();
    let mut seen = HashSet::with_capacity(local_files.len());

    for local_path in local_files {
        let relative_path = relative_path_of(project_root, local_path)?;
        seen.insert(relative_path.clone());

        let Some(cached) = snapshot.get(&relative_path) else {
            plan.uploads.push(TransferTask {
                local_path: local_path.clone(),
                relative_path,
                remote_id: None,
                parent_id: None,
            });
            continue;
        };

        let local_modified_at = modified_at_ms(local_path)?;
        if local_modified_at <= cached.modified_at {
            continue;
        }

        // The mtime moved; the hash decides between a real upload and a
        // timestamp-only cache update.
        let local_hash = md5_hex(local_path)?;
        plan.hashed += 1;
        if local_hash == cached.content_hash {
            plan.touches.push(cached.touched(local_modified_at));
            continue;
        }

        plan.uploads.push(TransferTask {
            local_path: local_path.clone(),
            relative_path,
            remote_id: Some(cached.remote_id.clone()),
            parent_id: None,
        });
    }

    for (relative_path, descriptor) in snapshot {
        if !seen.contains(relative_path) {
            plan.deletes.push(DeleteTask {
                relative_path: relative_path.clone(),
                remote_id: descriptor.remote_id.clone(),
            });
        }
    }

    Ok(plan)
}

/// Every regular file under the project root. Symlinks and special files are
/// not followed.
pub fn walk_local_files(project_root: &Path) -> Result<Vec<PathBuf>, PlanError> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(project_root) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn modified_at_ms(path: &Path) -> Result<i64, std::io::Error> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0))
}

fn md5_hex(path: &Path) -> Result<String, std::io::Error> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    Ok(format!("{:x}", context.compute()))
}
