//! Device Volume Access Abstraction
//!
//! Provides platform-agnostic traits for reading and writing a mounted
//! player volume. The host grants access to one directory tree (the volume
//! root); every path handed to these traits is relative to that root.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;

/// Metadata for one entry on the volume
#[derive(Debug, Clone)]
pub struct EntryMetadata {
    pub size: u64,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// Access to one mounted device volume
///
/// Abstracts the host capability layer that grants directory/file access:
/// - Desktop: direct filesystem access rooted at the mountpoint
/// - Browser hosts: a directory handle from a picker API
///
/// Every call is fallible: the device can disappear between any two
/// operations, and hosts may revoke permission at any time. Callers must
/// treat `NotFound` and `PermissionDenied` as ordinary outcomes.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::volume::VolumeAccess;
///
/// async fn database_bytes(volume: &dyn VolumeAccess) -> Result<bytes::Bytes> {
///     volume.read_file(Path::new("Control/MediaDB/Library.mdb")).await
/// }
/// ```
#[async_trait]
pub trait VolumeAccess: Send + Sync {
    /// Human-readable label for the volume (mount name or picker label)
    fn label(&self) -> String;

    /// Check whether a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for an entry
    async fn metadata(&self, path: &Path) -> Result<EntryMetadata>;

    /// Create a directory and any missing parents
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read an entire file into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write a file, creating parents and replacing any existing content
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Remove a single file
    async fn remove_file(&self, path: &Path) -> Result<()>;

    /// List entries of a directory, relative to the volume root
    async fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Host-side volume selection
///
/// Wraps the host's "pick a device" interaction. Selection is user-driven
/// and may be aborted; a `None` result is the normal cancelled outcome, not
/// an error.
#[async_trait]
pub trait VolumePicker: Send + Sync {
    /// Ask the host for a volume. `Ok(None)` means the user cancelled.
    async fn pick_volume(&self) -> Result<Option<Arc<dyn VolumeAccess>>>;
}
