//! # Transcode Pool
//!
//! Bounded-concurrency service in front of the external codec converter.
//! The converter itself lives behind [`bridge_traits::Transcoder`]; this
//! crate only schedules jobs and relays progress.

pub mod error;
pub mod pool;

pub use error::{Result, TranscodeError};
pub use pool::{TranscodePool, DEFAULT_TARGET_CONTAINER, MAX_CONCURRENT_JOBS};
