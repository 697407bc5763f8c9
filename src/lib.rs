//! Workspace facade re-exporting the member crates most hosts embed.

pub use core_device as device;
pub use core_library as library;
pub use core_sync as sync;
