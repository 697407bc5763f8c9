//! # Device Sync
//!
//! The staged commit path between the user's pending changes and the
//! physical device:
//!
//! - [`StagingQueue`](staging::StagingQueue) - pending uploads and deferred deletions
//! - [`DestinationAllocator`](allocator::DestinationAllocator) - unique bucket paths
//! - [`SyncPipeline`](pipeline::SyncPipeline) - the end-to-end session state machine

pub mod allocator;
pub mod error;
pub mod pipeline;
pub mod staging;

pub use allocator::DestinationAllocator;
pub use error::{Result, SyncError};
pub use pipeline::{SyncConfig, SyncPipeline, SyncReport, SyncStage};
pub use staging::{
    BytesSource, ContentSource, StagingQueue, UploadId, UploadSnapshot, UploadStatus,
    VolumeFileSource,
};
