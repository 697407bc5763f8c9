//! In-Memory Volume
//!
//! A `VolumeAccess` implementation backed by a `HashMap`, used by tests
//! across the workspace and by the device emulator. Supports fault
//! injection so pipeline failure paths can be exercised deterministically.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    volume::{EntryMetadata, VolumeAccess},
};
use bytes::Bytes;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Default)]
struct VolumeState {
    files: BTreeMap<PathBuf, Bytes>,
    dirs: HashSet<PathBuf>,
    /// Paths whose next write fails with an injected IO error.
    fail_writes: HashSet<PathBuf>,
    /// When set, every write fails.
    fail_all_writes: bool,
    write_count: u64,
}

/// In-memory device volume for tests and emulation
pub struct MemoryVolume {
    label: String,
    state: Mutex<VolumeState>,
}

impl MemoryVolume {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            state: Mutex::new(VolumeState::default()),
        }
    }

    /// Pre-create the fixed directory layout of a factory-fresh device.
    pub fn with_player_layout(label: &str) -> Self {
        let volume = Self::new(label);
        {
            let mut state = volume.state.lock().unwrap();
            for dir in ["Control", "Control/MediaDB", "Control/Media", "Control/Device"] {
                state.dirs.insert(PathBuf::from(dir));
            }
        }
        volume
    }

    /// Make the next write to `path` fail with an IO error.
    pub fn fail_next_write(&self, path: &Path) {
        self.state
            .lock()
            .unwrap()
            .fail_writes
            .insert(path.to_path_buf());
    }

    /// Make every subsequent write fail, simulating a yanked cable.
    pub fn fail_all_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_all_writes = fail;
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> u64 {
        self.state.lock().unwrap().write_count
    }

    /// Snapshot of stored file paths, sorted.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().files.keys().cloned().collect()
    }

    /// Remove a directory from the layout, simulating a corrupted card.
    pub fn drop_dir(&self, path: &Path) {
        let mut state = self.state.lock().unwrap();
        state.dirs.remove(path);
        state.files.retain(|p, _| !p.starts_with(path));
    }

    fn register_parents(dirs: &mut HashSet<PathBuf>, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir.as_os_str().is_empty() {
                break;
            }
            dirs.insert(dir.to_path_buf());
            current = dir.parent();
        }
    }
}

#[async_trait]
impl VolumeAccess for MemoryVolume {
    fn label(&self) -> String {
        self.label.clone()
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.files.contains_key(path) || state.dirs.contains(path))
    }

    async fn metadata(&self, path: &Path) -> Result<EntryMetadata> {
        let state = self.state.lock().unwrap();
        if let Some(data) = state.files.get(path) {
            return Ok(EntryMetadata {
                size: data.len() as u64,
                modified_at: None,
                is_directory: false,
            });
        }
        if state.dirs.contains(path) {
            return Ok(EntryMetadata {
                size: 0,
                modified_at: None,
                is_directory: true,
            });
        }
        Err(BridgeError::NotFound(path.display().to_string()))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.dirs.insert(path.to_path_buf());
        Self::register_parents(&mut state.dirs, path);
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let state = self.state.lock().unwrap();
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(path.display().to_string()))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_all_writes || state.fail_writes.remove(path) {
            return Err(BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected write failure",
            )));
        }
        Self::register_parents(&mut state.dirs, path);
        state.files.insert(path.to_path_buf(), data);
        state.write_count += 1;
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BridgeError::NotFound(path.display().to_string()))
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let state = self.state.lock().unwrap();
        if !state.dirs.contains(path) {
            return Err(BridgeError::NotFound(path.display().to_string()));
        }
        let mut entries: Vec<PathBuf> = state
            .files
            .keys()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();
        entries.extend(
            state
                .dirs
                .iter()
                .filter(|d| d.parent() == Some(path))
                .cloned(),
        );
        entries.sort();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip() {
        let volume = MemoryVolume::new("test");
        let path = Path::new("Control/Media/F00/song.mp3");

        volume.write_file(path, Bytes::from("abc")).await.unwrap();
        assert_eq!(volume.read_file(path).await.unwrap(), Bytes::from("abc"));
        assert!(volume.exists(Path::new("Control/Media/F00")).await.unwrap());
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let volume = MemoryVolume::new("test");
        let path = Path::new("Control/MediaDB/Library.mdb");

        volume.fail_next_write(path);
        assert!(volume.write_file(path, Bytes::new()).await.is_err());
        assert!(volume.write_file(path, Bytes::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_player_layout() {
        let volume = MemoryVolume::with_player_layout("test");
        assert!(volume.exists(Path::new("Control/MediaDB")).await.unwrap());
        assert!(volume.exists(Path::new("Control/Media")).await.unwrap());
    }
}
