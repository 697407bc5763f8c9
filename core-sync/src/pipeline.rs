//! # Sync Pipeline
//!
//! Orchestrates one end-to-end commit of the staging queue to the device:
//!
//! ```text
//! Idle → Staging → WritingDatabase → CopyingToDevice → ApplyingDeletes → Done
//!            \____________\_______________\__________________\→ Failed(stage)
//! ```
//!
//! ## Failure semantics
//!
//! - **Staging**: per-item. A failing item is rolled back (its created
//!   track removed) and left `Queued` for retry; the session continues
//!   with the next item.
//! - **WritingDatabase / CopyingToDevice**: fatal to the session. The
//!   queue keeps its `Staged` items, so a retry's staging phase performs
//!   zero redundant content copies.
//! - **ApplyingDeletes**: per-path, logged and skipped; the database no
//!   longer references the file.
//! - Queue and delete list are cleared only after reaching `Done`.
//!
//! Progress is emitted on the event bus as monotonically increasing
//! `(current, total, label)` tuples per stage, with terminal
//! `Completed` / `Failed` events.

use bridge_traits::volume::VolumeAccess;
use core_library::{layout, path::to_portable_format, Database, MediaKind, TrackFields};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, SyncEvent};
use core_transcode::TranscodePool;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::staging::{StagingQueue, UploadStatus};
use crate::DestinationAllocator;

/// Stages of one sync session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Idle,
    Staging,
    WritingDatabase,
    CopyingToDevice,
    ApplyingDeletes,
    Done,
}

impl SyncStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::Idle => "idle",
            SyncStage::Staging => "staging",
            SyncStage::WritingDatabase => "writing_database",
            SyncStage::CopyingToDevice => "copying_to_device",
            SyncStage::ApplyingDeletes => "applying_deletes",
            SyncStage::Done => "done",
        }
    }
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sync pipeline configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Container labels the device plays natively; anything else is
    /// transcoded first.
    pub supported_containers: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            supported_containers: vec![
                "MP3".to_string(),
                "M4A".to_string(),
                "AAC".to_string(),
                "WAV".to_string(),
            ],
        }
    }
}

/// Outcome of a completed session
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub tracks_committed: u64,
    pub items_skipped: u64,
    pub deletes_applied: u64,
    pub deletes_failed: u64,
}

/// One-session-at-a-time sync orchestrator
pub struct SyncPipeline {
    config: SyncConfig,
    volume: Arc<dyn VolumeAccess>,
    database: Arc<Mutex<Database>>,
    staging: Arc<StagingQueue>,
    allocator: DestinationAllocator,
    transcode: Arc<TranscodePool>,
    events: EventBus,
    active: AtomicBool,
}

/// Clears the active flag even on early return.
struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncPipeline {
    pub fn new(
        config: SyncConfig,
        volume: Arc<dyn VolumeAccess>,
        database: Arc<Mutex<Database>>,
        staging: Arc<StagingQueue>,
        transcode: Arc<TranscodePool>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            volume,
            database,
            staging,
            allocator: DestinationAllocator::new(),
            transcode,
            events,
            active: AtomicBool::new(false),
        }
    }

    fn device_supports(&self, container: &str) -> bool {
        self.config
            .supported_containers
            .iter()
            .any(|c| c.eq_ignore_ascii_case(container))
    }

    fn emit_progress(&self, session_id: &str, stage: SyncStage, current: u64, total: u64, label: &str) {
        self.events
            .emit(CoreEvent::Sync(SyncEvent::Progress {
                session_id: session_id.to_string(),
                stage: stage.as_str().to_string(),
                current,
                total,
                label: label.to_string(),
            }))
            .ok();
    }

    fn fail(&self, session_id: &str, stage: SyncStage, message: String) -> SyncError {
        warn!(stage = %stage, "Sync failed: {}", message);
        self.events
            .emit(CoreEvent::Sync(SyncEvent::Failed {
                session_id: session_id.to_string(),
                stage: stage.as_str().to_string(),
                message: message.clone(),
            }))
            .ok();
        SyncError::Stage {
            stage: stage.as_str().to_string(),
            message,
        }
    }

    /// Run one full sync session.
    ///
    /// Items are staged strictly one at a time to bound peak memory during
    /// content copies; the transcode pool applies its own concurrency cap
    /// underneath. A second concurrent call returns
    /// [`SyncError::SessionActive`].
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<SyncReport> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::SessionActive);
        }
        let _guard = ActiveGuard(&self.active);

        let session_id = Uuid::new_v4().to_string();
        let started_at = chrono::Utc::now();
        let mut report = SyncReport::default();

        let snapshots = self.staging.uploads().await;
        let pending_deletes = self.staging.pending_deletes().await;
        self.events
            .emit(CoreEvent::Sync(SyncEvent::Started {
                session_id: session_id.clone(),
                queued_uploads: snapshots
                    .iter()
                    .filter(|s| s.status == UploadStatus::Queued)
                    .count() as u64,
                pending_deletes: pending_deletes.len() as u64,
            }))
            .ok();

        // ------------------------------------------------------------------
        // Stage 1: Staging
        // ------------------------------------------------------------------
        let to_stage: Vec<_> = snapshots
            .iter()
            .filter(|s| s.status == UploadStatus::Queued)
            .cloned()
            .collect();
        let total = to_stage.len() as u64;
        let mut current = 0u64;
        info!(items = total, "Staging queued uploads");

        for snapshot in to_stage {
            self.emit_progress(
                &session_id,
                SyncStage::Staging,
                current,
                total,
                &snapshot.display_name,
            );

            match self.stage_one(&snapshot.id, &snapshot.display_name).await {
                Ok(()) => {
                    report.tracks_committed += 1;
                }
                Err(reason) => {
                    report.items_skipped += 1;
                    self.events
                        .emit(CoreEvent::Sync(SyncEvent::ItemSkipped {
                            session_id: session_id.clone(),
                            display_name: snapshot.display_name.clone(),
                            reason,
                        }))
                        .ok();
                }
            }
            current += 1;
            self.emit_progress(
                &session_id,
                SyncStage::Staging,
                current,
                total,
                &snapshot.display_name,
            );
        }

        // ------------------------------------------------------------------
        // Stage 2: WritingDatabase
        // ------------------------------------------------------------------
        self.emit_progress(&session_id, SyncStage::WritingDatabase, 0, 1, "serializing database");
        let output = {
            let mut db = self.database.lock().await;
            let output = db
                .persist()
                .map_err(|e| self.fail(&session_id, SyncStage::WritingDatabase, e.to_string()))?;
            self.events
                .emit(CoreEvent::Library(LibraryEvent::DatabasePersisted {
                    track_count: db.track_count() as u64,
                    playlist_count: db.playlists().len() as u64,
                }))
                .ok();
            output
        };
        self.emit_progress(&session_id, SyncStage::WritingDatabase, 1, 1, "database serialized");

        // ------------------------------------------------------------------
        // Stage 3: CopyingToDevice
        // ------------------------------------------------------------------
        self.emit_progress(&session_id, SyncStage::CopyingToDevice, 0, 2, "database file");
        self.volume
            .write_file(&layout::database_path(), output.database)
            .await
            .map_err(|e| self.fail(&session_id, SyncStage::CopyingToDevice, e.to_string()))?;
        self.emit_progress(&session_id, SyncStage::CopyingToDevice, 1, 2, "index file");

        // The index is an optimization the firmware can rebuild; its copy
        // is best-effort.
        if let Err(e) = self
            .volume
            .write_file(&layout::index_path(), output.index)
            .await
        {
            warn!("Could not copy secondary index: {}", e);
        }
        self.emit_progress(&session_id, SyncStage::CopyingToDevice, 2, 2, "copy complete");

        // ------------------------------------------------------------------
        // Stage 4: ApplyingDeletes
        // ------------------------------------------------------------------
        let deletes = self.staging.pending_deletes().await;
        let delete_total = deletes.len() as u64;
        for (i, device_path) in deletes.iter().enumerate() {
            self.emit_progress(
                &session_id,
                SyncStage::ApplyingDeletes,
                i as u64,
                delete_total,
                device_path,
            );
            let portable = to_portable_format(device_path);
            match self.volume.remove_file(Path::new(&portable)).await {
                Ok(()) => {
                    self.staging.delete_applied(device_path).await;
                    report.deletes_applied += 1;
                }
                Err(e) if e.is_not_found() => {
                    debug!(path = %portable, "File already absent, delete satisfied");
                    self.staging.delete_applied(device_path).await;
                    report.deletes_applied += 1;
                }
                Err(e) => {
                    warn!(path = %portable, "Deferred deletion failed, keeping: {}", e);
                    report.deletes_failed += 1;
                }
            }
        }
        self.emit_progress(
            &session_id,
            SyncStage::ApplyingDeletes,
            delete_total,
            delete_total,
            "deletions applied",
        );

        // ------------------------------------------------------------------
        // Done
        // ------------------------------------------------------------------
        self.staging.clear_staged().await;

        let duration_secs = (chrono::Utc::now() - started_at).num_seconds().max(0) as u64;
        info!(
            committed = report.tracks_committed,
            skipped = report.items_skipped,
            deletes = report.deletes_applied,
            duration_secs,
            "Sync session complete"
        );
        self.events
            .emit(CoreEvent::Sync(SyncEvent::Completed {
                session_id,
                tracks_committed: report.tracks_committed,
                deletes_applied: report.deletes_applied,
                duration_secs,
            }))
            .ok();

        Ok(report)
    }

    /// Stage one queued item. On error the queue entry stays `Queued` and
    /// any created track has been rolled back; the returned string is the
    /// skip reason.
    async fn stage_one(
        &self,
        id: &crate::staging::UploadId,
        display_name: &str,
    ) -> std::result::Result<(), String> {
        let id = *id;

        let source = self
            .staging
            .source(id)
            .await
            .ok_or_else(|| "upload vanished from queue".to_string())?;
        let mut content = source
            .read()
            .await
            .map_err(|e| format!("cannot read content: {}", e))?;

        let metadata = self
            .staging
            .get_or_compute_metadata(id, Some(&content))
            .await
            .ok_or_else(|| "upload vanished from queue".to_string())?;

        // Transcode when the device cannot play the source codec. User
        // tags stay from the original; technical properties come from the
        // converted output.
        let mut container = metadata.container.clone();
        let mut duration_ms = metadata.duration_ms;
        let mut bitrate_kbps = metadata.bitrate_kbps;
        let mut sample_rate_hz = metadata.sample_rate_hz;

        if !self.device_supports(&container) {
            debug!(name = display_name, from = %container, "Container unsupported, transcoding");
            let converted = self
                .transcode
                .convert(display_name, content.clone())
                .await
                .map_err(|e| format!("transcode failed: {}", e))?;

            content = converted.content;
            container = converted.container;
            if let Some(ms) = converted.duration_ms {
                duration_ms = ms as f64;
            }
            if let Some(kbps) = converted.bitrate_kbps {
                bitrate_kbps = kbps as f64;
            }
            if let Some(hz) = converted.sample_rate_hz {
                sample_rate_hz = hz as f64;
            }
        }

        // Allocate and reserve the destination before touching the
        // database, so a failure here leaves nothing to roll back.
        let dest_name = destination_name(display_name, &container);
        let dest_path = {
            let db = self.database.lock().await;
            self.allocator.allocate(&db, &dest_name).await
        };
        self.allocator
            .reserve(self.volume.as_ref(), &dest_path)
            .await
            .map_err(|e| format!("cannot reserve destination: {}", e))?;

        let handle = {
            let mut db = self.database.lock().await;
            db.create_track(TrackFields {
                title: metadata.title.clone(),
                artist: metadata.artist.clone(),
                album: metadata.album.clone(),
                genre: metadata.genre.clone(),
                track_number: metadata.track_number,
                disc_number: metadata.disc_number,
                year: metadata.year,
                duration_ms,
                bitrate_kbps,
                sample_rate_hz,
                size_bytes: content.len() as u64,
                file_type_label: container.clone(),
                media_kind: MediaKind::Audio,
            })
        };

        let size = content.len() as u64;
        if let Err(e) = self
            .volume
            .write_file(Path::new(&dest_path), content)
            .await
        {
            // Roll back the track so the database never references content
            // that is not on the device.
            let mut db = self.database.lock().await;
            if let Err(rollback) = db.remove_track(handle) {
                warn!("Rollback after copy failure also failed: {}", rollback);
            }
            return Err(format!("content copy failed: {}", e));
        }

        {
            let mut db = self.database.lock().await;
            if let Err(e) = db.finalize_track(handle, &dest_path, size) {
                if let Err(rollback) = db.remove_track(handle) {
                    warn!("Rollback after finalize failure also failed: {}", rollback);
                }
                return Err(format!("finalize failed: {}", e));
            }
        }

        self.staging
            .mark_staged(id)
            .await
            .map_err(|e| e.to_string())?;
        info!(name = display_name, path = %dest_path, "Staged upload");
        Ok(())
    }
}

/// Destination file name, with the extension matching the (possibly
/// transcoded) container so the firmware type marker comes out right.
fn destination_name(display_name: &str, container: &str) -> String {
    let stem = display_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(display_name);
    format!("{}.{}", stem, container.to_ascii_lowercase())
}
