//! # Destination Allocator
//!
//! Computes a unique on-device content path for each new file,
//! distributing content across the fixed `F00`..`F49` buckets to bound
//! per-directory size.
//!
//! Allocation is a deterministic function of what already exists: paths
//! committed in the database plus paths reserved earlier in the same
//! session. Nothing exists yet for files that have not been copied, so
//! [`DestinationAllocator::reserve`] must be called immediately after each
//! allocation: it drops a zero-length placeholder at the path and records
//! the reservation, guaranteeing the next allocation observes it and picks
//! a different name.

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::volume::VolumeAccess;
use bytes::Bytes;
use core_library::{layout, path::to_portable_format, Database};
use std::collections::HashSet;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

/// Longest file stem kept from the original name.
const MAX_STEM_LEN: usize = 24;

/// Session-scoped destination path allocator
pub struct DestinationAllocator {
    /// Portable paths reserved this session, committed or not.
    reserved: Mutex<HashSet<String>>,
}

impl DestinationAllocator {
    pub fn new() -> Self {
        Self {
            reserved: Mutex::new(HashSet::new()),
        }
    }

    /// Compute a free destination path (portable form) for a file.
    ///
    /// Collides with neither the database's committed paths nor this
    /// session's reservations.
    pub async fn allocate(&self, database: &Database, original_file_name: &str) -> String {
        let committed: HashSet<String> = database
            .device_paths()
            .iter()
            .map(|p| to_portable_format(p))
            .collect();
        let reserved = self.reserved.lock().await;

        let bucket = (committed.len() + reserved.len()) as u32 % layout::BUCKET_COUNT;
        let bucket_dir = layout::bucket_dir(bucket);
        let (stem, ext) = split_name(original_file_name);

        let mut candidate = join(&bucket_dir, &stem, &ext, None);
        let mut attempt = 0u32;
        while committed.contains(&candidate) || reserved.contains(&candidate) {
            attempt += 1;
            candidate = join(&bucket_dir, &stem, &ext, Some(attempt));
        }

        debug!(name = original_file_name, path = %candidate, "Allocated destination");
        candidate
    }

    /// Claim an allocated path: create a zero-length placeholder on the
    /// device and record the reservation.
    pub async fn reserve(&self, volume: &dyn VolumeAccess, path: &str) -> BridgeResult<()> {
        volume.write_file(Path::new(path), Bytes::new()).await?;
        self.reserved.lock().await.insert(path.to_string());
        Ok(())
    }

    /// Forget all reservations (new device session).
    pub async fn clear(&self) {
        self.reserved.lock().await.clear();
    }
}

impl Default for DestinationAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Reduce an arbitrary display name to a device-safe stem and extension.
fn split_name(name: &str) -> (String, String) {
    let (raw_stem, raw_ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() <= 4 => (stem, ext),
        _ => (name, "dat"),
    };

    let mut stem: String = raw_stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LEN)
        .collect();
    if stem.is_empty() {
        stem.push_str("track");
    }

    let ext: String = raw_ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    let ext = if ext.is_empty() { "dat".to_string() } else { ext };

    (stem, ext)
}

fn join(bucket_dir: &Path, stem: &str, ext: &str, suffix: Option<u32>) -> String {
    let file_name = match suffix {
        Some(n) => format!("{}_{}.{}", stem, n, ext),
        None => format!("{}.{}", stem, ext),
    };
    bucket_dir.join(file_name).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::MemoryVolume;

    #[tokio::test]
    async fn test_allocations_with_reserve_are_distinct() {
        let db = Database::new("Player");
        let volume = MemoryVolume::with_player_layout("P");
        let allocator = DestinationAllocator::new();

        let mut seen = HashSet::new();
        for _ in 0..20 {
            let path = allocator.allocate(&db, "same name.mp3").await;
            allocator.reserve(&volume, &path).await.unwrap();
            assert!(seen.insert(path), "allocator returned a duplicate path");
        }
    }

    #[tokio::test]
    async fn test_reserve_writes_placeholder() {
        let db = Database::new("Player");
        let volume = MemoryVolume::with_player_layout("P");
        let allocator = DestinationAllocator::new();

        let path = allocator.allocate(&db, "song.mp3").await;
        allocator.reserve(&volume, &path).await.unwrap();

        use bridge_traits::volume::VolumeAccess as _;
        let placeholder = volume.read_file(Path::new(&path)).await.unwrap();
        assert!(placeholder.is_empty());
    }

    #[tokio::test]
    async fn test_avoids_committed_database_paths() {
        let mut db = Database::new("Player");
        let handle = db.create_track(Default::default());
        // Same bucket index an empty session would pick next.
        db.finalize_track(handle, "Control/Media/F01/song.mp3", 1)
            .unwrap();

        let allocator = DestinationAllocator::new();
        let path = allocator.allocate(&db, "song.mp3").await;
        assert_ne!(path, "Control/Media/F01/song.mp3");
    }

    #[tokio::test]
    async fn test_hostile_names_are_sanitized() {
        let db = Database::new("Player");
        let allocator = DestinationAllocator::new();

        let path = allocator.allocate(&db, "weird / name?.mp3").await;
        assert!(path.starts_with("Control/Media/F"));
        assert!(path.ends_with(".mp3"));
        assert!(!path.contains('?'));
        assert!(!path[path.rfind('/').unwrap() + 1..].contains(' '));
    }

    #[test]
    fn test_split_name_defaults() {
        assert_eq!(split_name("noext"), ("noext".to_string(), "dat".to_string()));
        assert_eq!(split_name(".hidden"), ("_hidden".to_string(), "dat".to_string()));
    }
}
