//! Native Volume Implementation using Tokio
//!
//! Wraps a locally mounted device directory behind [`VolumeAccess`]. All
//! paths are resolved against the mountpoint; escaping the mountpoint with
//! `..` components is rejected.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    volume::{EntryMetadata, VolumeAccess, VolumePicker},
};
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

/// A device volume mounted on the local filesystem
pub struct NativeVolume {
    mountpoint: PathBuf,
}

impl NativeVolume {
    /// Wrap an already-mounted directory.
    pub fn new(mountpoint: PathBuf) -> Self {
        Self { mountpoint }
    }

    /// Resolve a volume-relative path against the mountpoint.
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        if path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir))
        {
            return Err(BridgeError::PermissionDenied(format!(
                "path escapes volume root: {}",
                path.display()
            )));
        }
        Ok(self.mountpoint.join(path))
    }

    fn map_io_error(path: &Path, e: std::io::Error) -> BridgeError {
        match e.kind() {
            std::io::ErrorKind::NotFound => BridgeError::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                BridgeError::PermissionDenied(path.display().to_string())
            }
            _ => BridgeError::Io(e),
        }
    }
}

#[async_trait]
impl VolumeAccess for NativeVolume {
    fn label(&self) -> String {
        self.mountpoint
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.mountpoint.display().to_string())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let full = self.resolve(path)?;
        fs::try_exists(&full)
            .await
            .map_err(|e| Self::map_io_error(path, e))
    }

    async fn metadata(&self, path: &Path) -> Result<EntryMetadata> {
        let full = self.resolve(path)?;
        let metadata = fs::metadata(&full)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;

        Ok(EntryMetadata {
            size: metadata.len(),
            modified_at: metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64),
            is_directory: metadata.is_dir(),
        })
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path)?;
        fs::create_dir_all(&full)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let full = self.resolve(path)?;
        let data = fs::read(&full)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::map_io_error(path, e))?;
        }
        fs::write(&full, data.as_ref())
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path)?;
        fs::remove_file(&full)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, "Removed file");
        Ok(())
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let full = self.resolve(path)?;
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&full)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| Self::map_io_error(path, e))?
        {
            if let Ok(relative) = entry.path().strip_prefix(&self.mountpoint) {
                entries.push(relative.to_path_buf());
            }
        }

        debug!(path = ?path, count = entries.len(), "Listed directory");
        Ok(entries)
    }
}

/// Picker that always yields one fixed mountpoint.
///
/// Desktop hosts usually know the mountpoint up front (CLI flag, udev
/// event), so the interactive picker collapses to this.
pub struct FixedMountPicker {
    mountpoint: PathBuf,
}

impl FixedMountPicker {
    pub fn new(mountpoint: PathBuf) -> Self {
        Self { mountpoint }
    }
}

#[async_trait]
impl VolumePicker for FixedMountPicker {
    async fn pick_volume(&self) -> Result<Option<Arc<dyn VolumeAccess>>> {
        if !fs::try_exists(&self.mountpoint).await? {
            return Err(BridgeError::NotFound(
                self.mountpoint.display().to_string(),
            ));
        }
        Ok(Some(Arc::new(NativeVolume::new(self.mountpoint.clone()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let volume = NativeVolume::new(dir.path().to_path_buf());

        let data = Bytes::from("Hello, World!");
        volume
            .write_file(Path::new("Control/test.bin"), data.clone())
            .await
            .unwrap();

        let read_data = volume.read_file(Path::new("Control/test.bin")).await.unwrap();
        assert_eq!(data, read_data);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let volume = NativeVolume::new(dir.path().to_path_buf());

        let err = volume.read_file(Path::new("absent.bin")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_parent_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let volume = NativeVolume::new(dir.path().to_path_buf());

        let err = volume
            .read_file(Path::new("../outside.bin"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_list_dir_returns_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let volume = NativeVolume::new(dir.path().to_path_buf());

        volume
            .write_file(Path::new("Control/Media/F00/a.mp3"), Bytes::new())
            .await
            .unwrap();

        let entries = volume.list_dir(Path::new("Control/Media/F00")).await.unwrap();
        assert_eq!(entries, vec![PathBuf::from("Control/Media/F00/a.mp3")]);
    }
}
