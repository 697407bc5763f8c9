//! # Event Bus System
//!
//! Provides an event-driven architecture for the player core using
//! `tokio::sync::broadcast`. Modules emit typed events; the UI layer and
//! tests subscribe without coupling to the emitters.
//!
//! ## Overview
//!
//! - **Event Types**: strongly-typed enum hierarchies per domain
//! - **EventBus**: central broadcast channel for publishing events
//! - **Subscription Management**: multiple independent subscribers
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, DeviceEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Device(DeviceEvent::Connected {
//!         label: "MYPLAYER".to_string(),
//!         track_count: 120,
//!     }))
//!     .ok();
//! ```
//!
//! ## Error Handling
//!
//! The bus wraps `tokio::sync::broadcast`; subscribers can observe
//! `RecvError::Lagged(n)` when they fall behind (non-fatal) and
//! `RecvError::Closed` on shutdown. Emitting with no subscribers returns an
//! error the emitter is free to ignore.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Library content changes
    Library(LibraryEvent),
    /// Sync session lifecycle and progress
    Sync(SyncEvent),
    /// Device connection lifecycle
    Device(DeviceEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Device(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Device(DeviceEvent::Disconnected { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Device(DeviceEvent::Connected { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Library Events
// ============================================================================

/// Events related to library content changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// New track registered in the database.
    TrackAdded {
        /// Track title.
        title: String,
        /// Artist name.
        artist: String,
    },
    /// Track metadata updated.
    TrackUpdated {
        /// Fields that were updated.
        updated_fields: Vec<String>,
    },
    /// Track removed from the database.
    TrackRemoved {
        /// Title of the removed track.
        title: String,
        /// Device path scheduled for deferred deletion, if any.
        device_path: Option<String>,
    },
    /// New playlist created.
    PlaylistCreated {
        /// Playlist name.
        name: String,
    },
    /// Playlist renamed, deleted, or membership changed.
    PlaylistUpdated {
        /// What changed (e.g. "renamed", "deleted", "member_added").
        change_type: String,
    },
    /// The database was persisted to bytes and track ids assigned.
    DatabasePersisted {
        /// Number of tracks serialized.
        track_count: u64,
        /// Number of playlists serialized.
        playlist_count: u64,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::TrackAdded { .. } => "Track added to library",
            LibraryEvent::TrackUpdated { .. } => "Track metadata updated",
            LibraryEvent::TrackRemoved { .. } => "Track removed from library",
            LibraryEvent::PlaylistCreated { .. } => "Playlist created",
            LibraryEvent::PlaylistUpdated { .. } => "Playlist updated",
            LibraryEvent::DatabasePersisted { .. } => "Database persisted",
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events related to a device sync session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Sync session started.
    Started {
        /// Unique identifier for this session.
        session_id: String,
        /// Items queued for upload at session start.
        queued_uploads: u64,
        /// Deferred deletions to apply.
        pending_deletes: u64,
    },
    /// Incremental progress update during one stage.
    ///
    /// `current` increases monotonically within a stage.
    Progress {
        /// The session ID.
        session_id: String,
        /// Stage the progress belongs to (e.g. "staging").
        stage: String,
        /// Items completed so far within the stage.
        current: u64,
        /// Total items for the stage.
        total: u64,
        /// What is being worked on right now.
        label: String,
    },
    /// One queued item could not be committed and stays queued.
    ItemSkipped {
        /// The session ID.
        session_id: String,
        /// Display name of the skipped item.
        display_name: String,
        /// Why the item was skipped.
        reason: String,
    },
    /// Sync finished successfully; queue and deletes cleared.
    Completed {
        /// The session ID.
        session_id: String,
        /// Tracks committed this session.
        tracks_committed: u64,
        /// Physical deletions applied.
        deletes_applied: u64,
        /// Duration of the session in seconds.
        duration_secs: u64,
    },
    /// Sync stopped at a stage; queue and deletes retained for retry.
    Failed {
        /// The session ID.
        session_id: String,
        /// Stage that failed (e.g. "writing_database").
        stage: String,
        /// Human-readable error message.
        message: String,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::Progress { .. } => "Sync in progress",
            SyncEvent::ItemSkipped { .. } => "Sync item skipped",
            SyncEvent::Completed { .. } => "Sync completed successfully",
            SyncEvent::Failed { .. } => "Sync failed",
        }
    }
}

// ============================================================================
// Device Events
// ============================================================================

/// Events related to device connection lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DeviceEvent {
    /// Device volume verified and database opened.
    Connected {
        /// Volume label.
        label: String,
        /// Tracks found in the on-device database.
        track_count: u64,
    },
    /// Device requires its one-time pairing setup before use.
    PairingRequired {
        /// Volume label.
        label: String,
    },
    /// Device became unreachable; session state was torn down.
    Disconnected {
        /// Why the connection was dropped.
        reason: String,
    },
}

impl DeviceEvent {
    fn description(&self) -> &str {
        match self {
            DeviceEvent::Connected { .. } => "Device connected",
            DeviceEvent::PairingRequired { .. } => "Device pairing required",
            DeviceEvent::Disconnected { .. } => "Device disconnected",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when there are none. Emitters generally `.ok()` the result.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive future events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let event = CoreEvent::Library(LibraryEvent::TrackAdded {
            title: "Song".to_string(),
            artist: "Artist".to_string(),
        });
        bus.emit(event.clone()).unwrap();

        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(CoreEvent::Device(DeviceEvent::Disconnected {
            reason: "probe failed".to_string(),
        }))
        .unwrap();

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[test]
    fn test_emit_without_subscribers_is_err() {
        let bus = EventBus::new(16);
        let result = bus.emit(CoreEvent::Sync(SyncEvent::Started {
            session_id: "s".to_string(),
            queued_uploads: 0,
            pending_deletes: 0,
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_severity() {
        let failed = CoreEvent::Sync(SyncEvent::Failed {
            session_id: "s".to_string(),
            stage: "staging".to_string(),
            message: "boom".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);

        let disconnected = CoreEvent::Device(DeviceEvent::Disconnected {
            reason: "gone".to_string(),
        });
        assert_eq!(disconnected.severity(), EventSeverity::Warning);
    }
}
