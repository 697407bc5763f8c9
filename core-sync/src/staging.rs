//! # Staging Queue
//!
//! Holds user-submitted pending uploads and deferred deletions until a sync
//! session commits them to the device.
//!
//! ## Overview
//!
//! - Uploads enter as `Queued` and become `Staged` once their bytes are
//!   durably on the device; they leave the queue only after the whole
//!   session succeeds, which makes retries idempotent.
//! - Deletions are decoupled from database track removal: the database
//!   entry goes immediately, the physical file goes with the next
//!   successful sync, so a failed sync never leaves the device missing a
//!   file its database still references.
//! - Metadata enrichment is best-effort and asynchronous; it never blocks
//!   enqueue and may race a user-triggered sync. The memoized
//!   compute-or-fetch in [`StagingQueue::get_or_compute_metadata`] makes
//!   the race harmless: whoever gets there first fills the cache, nobody
//!   recomputes a complete result.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::volume::VolumeAccess;
use bytes::Bytes;
use core_metadata::{MetadataResolver, ResolvedMetadata};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// Type-safe pending upload identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadId(Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a pending upload stands in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    /// Waiting for a sync session to copy it to the device.
    Queued,
    /// Content bytes are on the device; only the database commit remains.
    Staged,
}

/// Opaque handle to the content bytes of a pending upload.
///
/// The host decides what backs it (a picked file, a drag-and-drop blob);
/// the queue only ever asks to read it.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn read(&self) -> BridgeResult<Bytes>;
}

/// Content held directly in memory.
pub struct BytesSource(pub Bytes);

#[async_trait]
impl ContentSource for BytesSource {
    async fn read(&self) -> BridgeResult<Bytes> {
        Ok(self.0.clone())
    }
}

/// Content read from a volume on demand.
pub struct VolumeFileSource {
    pub volume: Arc<dyn VolumeAccess>,
    pub path: PathBuf,
}

#[async_trait]
impl ContentSource for VolumeFileSource {
    async fn read(&self) -> BridgeResult<Bytes> {
        self.volume.read_file(&self.path).await
    }
}

struct PendingUpload {
    id: UploadId,
    display_name: String,
    status: UploadStatus,
    source: Arc<dyn ContentSource>,
    metadata: Option<ResolvedMetadata>,
}

/// External view of one queue entry
#[derive(Debug, Clone)]
pub struct UploadSnapshot {
    pub id: UploadId,
    pub display_name: String,
    pub status: UploadStatus,
    pub has_metadata: bool,
}

/// Pending uploads plus deferred deletions for one open device session
pub struct StagingQueue {
    uploads: Arc<Mutex<Vec<PendingUpload>>>,
    /// Colon-encoded device paths awaiting physical removal.
    deletes: Mutex<Vec<String>>,
    resolver: Arc<MetadataResolver>,
}

impl StagingQueue {
    pub fn new(resolver: Arc<MetadataResolver>) -> Self {
        Self {
            uploads: Arc::new(Mutex::new(Vec::new())),
            deletes: Mutex::new(Vec::new()),
            resolver,
        }
    }

    // ------------------------------------------------------------------
    // Uploads
    // ------------------------------------------------------------------

    /// Append new uploads and kick off best-effort enrichment for each.
    ///
    /// Returns the assigned ids in input order. Enrichment runs detached
    /// and never blocks this call.
    pub async fn enqueue(&self, items: Vec<(String, Arc<dyn ContentSource>)>) -> Vec<UploadId> {
        let mut ids = Vec::with_capacity(items.len());
        {
            let mut uploads = self.uploads.lock().await;
            for (display_name, source) in items {
                let id = UploadId::new();
                debug!(id = %id, name = %display_name, "Enqueued upload");
                uploads.push(PendingUpload {
                    id,
                    display_name,
                    status: UploadStatus::Queued,
                    source,
                    metadata: None,
                });
                ids.push(id);
            }
        }

        for &id in &ids {
            let uploads = Arc::clone(&self.uploads);
            let resolver = Arc::clone(&self.resolver);
            tokio::spawn(async move {
                if compute_and_store(&uploads, &resolver, id, None)
                    .await
                    .is_none()
                {
                    debug!(id = %id, "Enrichment skipped (entry gone or unreadable)");
                }
            });
        }

        ids
    }

    /// Remove one still-queued entry.
    ///
    /// Staged entries are already on the device and must ride out the
    /// session; removing them here would orphan content.
    pub async fn remove(&self, id: UploadId) -> Result<()> {
        let mut uploads = self.uploads.lock().await;
        let index = uploads
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| SyncError::UploadNotFound(id.to_string()))?;
        if uploads[index].status != UploadStatus::Queued {
            return Err(SyncError::NotQueued(id.to_string()));
        }
        uploads.remove(index);
        Ok(())
    }

    /// Snapshot of the queue in order.
    pub async fn uploads(&self) -> Vec<UploadSnapshot> {
        self.uploads
            .lock()
            .await
            .iter()
            .map(|u| UploadSnapshot {
                id: u.id,
                display_name: u.display_name.clone(),
                status: u.status,
                has_metadata: u.metadata.is_some(),
            })
            .collect()
    }

    /// Number of entries still waiting to be staged.
    pub async fn queued_count(&self) -> usize {
        self.uploads
            .lock()
            .await
            .iter()
            .filter(|u| u.status == UploadStatus::Queued)
            .count()
    }

    /// Total entries in the queue.
    pub async fn len(&self) -> usize {
        self.uploads.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.uploads.lock().await.is_empty()
    }

    /// Content source of an entry.
    pub async fn source(&self, id: UploadId) -> Option<Arc<dyn ContentSource>> {
        self.uploads
            .lock()
            .await
            .iter()
            .find(|u| u.id == id)
            .map(|u| Arc::clone(&u.source))
    }

    /// Memoized metadata resolution.
    ///
    /// Returns the cached result without any I/O when enrichment already
    /// completed; otherwise reads the content (unless the caller already
    /// has it in hand) and resolves synchronously. Guarantees a committed
    /// track never misses core fields, independent of enrichment timing.
    pub async fn get_or_compute_metadata(
        &self,
        id: UploadId,
        content: Option<&Bytes>,
    ) -> Option<ResolvedMetadata> {
        compute_and_store(&self.uploads, &self.resolver, id, content).await
    }

    /// Mark an entry's bytes as durably written to the device.
    pub async fn mark_staged(&self, id: UploadId) -> Result<()> {
        let mut uploads = self.uploads.lock().await;
        let entry = uploads
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| SyncError::UploadNotFound(id.to_string()))?;
        entry.status = UploadStatus::Staged;
        Ok(())
    }

    /// Drop every staged entry after a fully successful session. Entries
    /// that failed staging stay queued for the next attempt.
    pub async fn clear_staged(&self) {
        self.uploads
            .lock()
            .await
            .retain(|u| u.status != UploadStatus::Staged);
    }

    // ------------------------------------------------------------------
    // Deferred deletions
    // ------------------------------------------------------------------

    /// Queue a device path (colon-encoded) for physical removal during the
    /// next successful sync.
    pub async fn schedule_delete(&self, device_path: String) {
        debug!(path = %device_path, "Scheduled deferred deletion");
        self.deletes.lock().await.push(device_path);
    }

    /// Paths still awaiting physical removal.
    pub async fn pending_deletes(&self) -> Vec<String> {
        self.deletes.lock().await.clone()
    }

    /// Drop one delete entry after its physical removal succeeded.
    pub async fn delete_applied(&self, device_path: &str) {
        self.deletes.lock().await.retain(|p| p != device_path);
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Discard everything. Used when the device connection is torn down.
    pub async fn clear(&self) {
        self.uploads.lock().await.clear();
        self.deletes.lock().await.clear();
    }
}

/// Resolve-and-cache shared by enrichment tasks and the sync pipeline.
///
/// The race between them is benign: computation happens outside the lock,
/// and the first stored result wins; a complete cached value is never
/// recomputed or replaced.
async fn compute_and_store(
    uploads: &Mutex<Vec<PendingUpload>>,
    resolver: &MetadataResolver,
    id: UploadId,
    content: Option<&Bytes>,
) -> Option<ResolvedMetadata> {
    // Fast path: cached and complete.
    let (display_name, source) = {
        let uploads = uploads.lock().await;
        let entry = uploads.iter().find(|u| u.id == id)?;
        if let Some(metadata) = &entry.metadata {
            return Some(metadata.clone());
        }
        (entry.display_name.clone(), Arc::clone(&entry.source))
    };

    // Compute outside the lock; the queue stays usable meanwhile.
    let owned;
    let bytes = match content {
        Some(bytes) => bytes,
        None => {
            owned = match source.read().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(id = %id, "Cannot read content for enrichment: {}", e);
                    return None;
                }
            };
            &owned
        }
    };
    let resolved = resolver.resolve(&display_name, bytes);

    let mut uploads = uploads.lock().await;
    let entry = uploads.iter_mut().find(|u| u.id == id)?;
    if entry.metadata.is_none() {
        entry.metadata = Some(resolved);
    }
    entry.metadata.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> Arc<StagingQueue> {
        Arc::new(StagingQueue::new(Arc::new(MetadataResolver::new())))
    }

    fn item(name: &str) -> (String, Arc<dyn ContentSource>) {
        (
            name.to_string(),
            Arc::new(BytesSource(Bytes::from_static(&[0x01, 0x02]))),
        )
    }

    #[tokio::test]
    async fn test_enqueue_starts_queued() {
        let queue = queue();
        let ids = queue.enqueue(vec![item("a.mp3"), item("b.mp3")]).await;
        assert_eq!(ids.len(), 2);
        assert_eq!(queue.queued_count().await, 2);

        let snapshots = queue.uploads().await;
        assert!(snapshots.iter().all(|s| s.status == UploadStatus::Queued));
    }

    #[tokio::test]
    async fn test_metadata_is_memoized() {
        let queue = queue();
        let ids = queue
            .enqueue(vec![item("Artist - Song.mp3")])
            .await;

        let first = queue.get_or_compute_metadata(ids[0], None).await.unwrap();
        assert_eq!(first.artist, "Artist");
        assert_eq!(first.title, "Song");

        // Second call returns the cached value even without content access.
        let second = queue.get_or_compute_metadata(ids[0], None).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_remove_only_queued_entries() {
        let queue = queue();
        let ids = queue.enqueue(vec![item("a.mp3")]).await;

        queue.mark_staged(ids[0]).await.unwrap();
        assert!(matches!(
            queue.remove(ids[0]).await,
            Err(SyncError::NotQueued(_))
        ));

        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_clear_staged_keeps_queued() {
        let queue = queue();
        let ids = queue.enqueue(vec![item("a.mp3"), item("b.mp3")]).await;
        queue.mark_staged(ids[0]).await.unwrap();

        queue.clear_staged().await;
        let remaining = queue.uploads().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, ids[1]);
    }

    #[tokio::test]
    async fn test_deletes_lifecycle() {
        let queue = queue();
        queue
            .schedule_delete("Control:Media:F00:old.mp3".to_string())
            .await;
        assert_eq!(queue.pending_deletes().await.len(), 1);

        queue.delete_applied("Control:Media:F00:old.mp3").await;
        assert!(queue.pending_deletes().await.is_empty());
    }
}
