//! # Device Library Engine
//!
//! In-memory model of one portable player's on-device database: tracks,
//! playlists, and the binary file they persist to.
//!
//! ## Overview
//!
//! - [`Database`](database::Database) - load, mutate, validate, serialize
//! - [`TrackHandle`](models::TrackHandle) - session-stable track identity
//! - [`path`] - device (colon) / portable (slash) path conversion
//! - [`layout`] - the fixed on-device directory tree
//! - [`device`] - best-effort SysInfo identity and pairing state
//!
//! The engine never touches the device directly except through
//! [`bridge_traits::VolumeAccess`] at its load boundary; serialization
//! produces bytes for the sync pipeline to copy.

pub mod database;
pub mod device;
pub mod error;
pub(crate) mod format;
pub mod layout;
pub mod models;
pub mod path;
pub mod sanitize;

pub use database::{Database, PersistOutput};
pub use device::{ChecksumKind, DeviceInfo};
pub use error::{LibraryError, Result};
pub use models::{
    type_marker_for, MediaKind, Playlist, PlaylistId, Track, TrackFields, TrackHandle,
    TrackUpdate, DEFAULT_BITRATE_KBPS, DEFAULT_DURATION_MS, DEFAULT_SAMPLE_RATE_HZ,
};
