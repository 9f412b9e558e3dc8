use std::collections::HashMap;

use tokio::sync::RwLock;
use worksync_core::RemoteFileDescriptor;

use super::ProjectId;

/// Authoritative record of what is currently believed to exist remotely, per
/// project, keyed by relative path. Used to avoid redundant transfers and to
/// detect remote-side deletions. A project's bucket is created lazily on
/// first write and dropped wholesale on close.
#[derive(Debug, Default)]
pub struct SyncStateCache {
    state: RwLock<HashMap<ProjectId, HashMap<String, RemoteFileDescriptor>>>,
}

impl SyncStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(
        &self,
        project_id: ProjectId,
        relative_path: &str,
    ) -> Option<RemoteFileDescriptor> {
        self.state
            .read()
            .await
            .get(&project_id)?
            .get(relative_path)
            .cloned()
    }

    /// Insert or replace, keyed by the descriptor's relative path.
    pub async fn put(&self, project_id: ProjectId, descriptor: RemoteFileDescriptor) {
        self.state
            .write()
            .await
            .entry(project_id)
            .or_default()
            .insert(descriptor.relative_path.clone(), descriptor);
    }

    pub async fn remove(&self, project_id: ProjectId, relative_path: &str) {
        if let Some(bucket) = self.state.write().await.get_mut(&project_id) {
            bucket.remove(relative_path);
        }
    }

    /// Point-in-time copy of a project's bucket, so iteration during a sync
    /// pass never observes interleaved mutation from that same pass. Not a
    /// cross-key transaction.
    pub async fn snapshot(&self, project_id: ProjectId) -> HashMap<String, RemoteFileDescriptor> {
        self.state
            .read()
            .await
            .get(&project_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn clear(&self, project_id: ProjectId) {
        self.state.write().await.remove(&project_id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn descriptor(relative_path: &str, modified_at: i64) -> RemoteFileDescriptor {
        RemoteFileDescriptor {
            remote_id: format!("rid-{relative_path}"),
            relative_path: relative_path.to_string(),
            content_hash: "00000000000000000000000000000000".into(),
            modified_at,
            size: 1,
        }
    }

    #[tokio::test]
    async fn put_and_get_round_trip() {
        let cache = SyncStateCache::new();
        cache.put(1, descriptor("a.txt", 1000)).await;

        let found = cache.get(1, "a.txt").await.unwrap();
        assert_eq!(found.modified_at, 1000);
        assert!(cache.get(1, "b.txt").await.is_none());
        assert!(cache.get(2, "a.txt").await.is_none());
    }

    #[tokio::test]
    async fn put_replaces_by_relative_path() {
        let cache = SyncStateCache::new();
        cache.put(1, descriptor("a.txt", 1000)).await;
        cache.put(1, descriptor("a.txt", 2000)).await;

        assert_eq!(cache.get(1, "a.txt").await.unwrap().modified_at, 2000);
        assert_eq!(cache.snapshot(1).await.len(), 1);
    }

    #[tokio::test]
    async fn snapshot_is_isolated_from_later_writes() {
        let cache = SyncStateCache::new();
        cache.put(1, descriptor("a.txt", 1000)).await;

        let snapshot = cache.snapshot(1).await;
        cache.put(1, descriptor("b.txt", 2000)).await;
        cache.remove(1, "a.txt").await;

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("a.txt"));
    }

    #[tokio::test]
    async fn snapshot_of_unknown_project_is_empty() {
        let cache = SyncStateCache::new();
        assert!(cache.snapshot(99).await.is_empty());
    }

    #[tokio::test]
    async fn clear_drops_the_whole_bucket() {
        let cache = SyncStateCache::new();
        cache.put(1, descriptor("a.txt", 1000)).await;
        cache.put(2, descriptor("b.txt", 1000)).await;

        cache.clear(1).await;

        assert!(cache.snapshot(1).await.is_empty());
        assert_eq!(cache.snapshot(2).await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_puts_do_not_lose_updates() {
        let cache = Arc::new(SyncStateCache::new());
        let mut handles = Vec::new();
        for i in 0..64 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.put(1, descriptor(&format!("file-{i}.txt"), i)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.snapshot(1).await.len(), 64);
    }
}
