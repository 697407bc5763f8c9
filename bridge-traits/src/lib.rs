//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host.
//!
//! ## Overview
//!
//! This crate defines the contract between the core library and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that differs per host (desktop mount, browser directory
//! handle, test harness).
//!
//! ## Traits
//!
//! - [`VolumeAccess`](volume::VolumeAccess) - file I/O rooted at a device volume
//! - [`VolumePicker`](volume::VolumePicker) - user-driven, cancellable volume selection
//! - [`Transcoder`](transcode::Transcoder) - black-box codec conversion with progress
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Host
//! implementations should convert platform errors into it and preserve the
//! `NotFound` / `PermissionDenied` distinction; the sync pipeline and the
//! connection monitor branch on it.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks.

pub mod error;
pub mod transcode;
pub mod volume;

pub use error::{BridgeError, Result};
pub use transcode::{TranscodeOutput, TranscodeProgress, Transcoder};
pub use volume::{EntryMetadata, VolumeAccess, VolumePicker};
