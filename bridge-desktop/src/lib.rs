//! # Desktop Bridge Implementations
//!
//! Concrete bridge implementations for desktop hosts where the player
//! volume is an ordinary mounted directory:
//!
//! - [`NativeVolume`](volume::NativeVolume) - `tokio::fs` backed volume access
//! - [`FixedMountPicker`](volume::FixedMountPicker) - non-interactive volume selection
//! - [`MemoryVolume`](memory::MemoryVolume) - in-memory volume for tests and emulation

pub mod memory;
pub mod volume;

pub use memory::MemoryVolume;
pub use volume::{FixedMountPicker, NativeVolume};
