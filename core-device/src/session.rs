//! Device Session State
//!
//! Everything that lives and dies with one device connection: the open
//! database, the staging queue, and the user's current view selection.
//! The connection monitor tears all of it down on loss.

use async_trait::async_trait;
use core_library::{Database, PlaylistId};
use core_sync::StagingQueue;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Hook invoked when the device connection is lost.
#[async_trait]
pub trait SessionTeardown: Send + Sync {
    async fn teardown(&self);
}

/// Shared session state for one connected device
pub struct DeviceSession {
    /// The open database; `None` while disconnected.
    pub database: Arc<Mutex<Option<Database>>>,
    /// Pending uploads and deferred deletions.
    pub staging: Arc<StagingQueue>,
    /// Playlist the UI is currently showing.
    pub selection: Mutex<Option<PlaylistId>>,
}

impl DeviceSession {
    pub fn new(staging: Arc<StagingQueue>) -> Self {
        Self {
            database: Arc::new(Mutex::new(None)),
            staging,
            selection: Mutex::new(None),
        }
    }

    /// Install a freshly loaded database.
    pub async fn open(&self, database: Database) {
        *self.database.lock().await = Some(database);
    }

    /// Tracks in the open database, 0 while disconnected.
    pub async fn track_count(&self) -> usize {
        self.database
            .lock()
            .await
            .as_ref()
            .map(|db| db.track_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl SessionTeardown for DeviceSession {
    async fn teardown(&self) {
        // Queue contents are discarded with the session rather than kept
        // for a reconnect; a replug starts from the device's own state.
        *self.database.lock().await = None;
        self.staging.clear().await;
        *self.selection.lock().await = None;
        info!("Session state cleared");
    }
}
