//! Codec Conversion Abstraction
//!
//! The transcoding engine is an external collaborator; the core only sees
//! this boundary. Input goes in as raw content bytes, converted content
//! comes back along with the technical properties of the new encoding.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;

/// Incremental progress for one conversion job
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscodeProgress {
    /// Completion fraction in `[0.0, 1.0]`
    pub fraction: f32,
}

/// Result of a completed conversion
#[derive(Debug, Clone)]
pub struct TranscodeOutput {
    /// Converted content bytes
    pub content: Bytes,
    /// Container label of the output (e.g. "MP3")
    pub container: String,
    /// Duration measured during conversion, if the engine reports it
    pub duration_ms: Option<u64>,
    /// Output bitrate in kbps
    pub bitrate_kbps: Option<u32>,
    /// Output sample rate in Hz
    pub sample_rate_hz: Option<u32>,
}

/// Codec converter trait
///
/// Implementations convert an unsupported input codec into the requested
/// target container. Long conversions report incremental progress through
/// the provided channel; dropping the receiver must not fail the job.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `input` into `target_container`.
    ///
    /// # Errors
    ///
    /// Fails when the input cannot be decoded or the target cannot be
    /// produced. A failure affects only this job.
    async fn transcode(
        &self,
        input: Bytes,
        target_container: &str,
        progress: mpsc::Sender<TranscodeProgress>,
    ) -> Result<TranscodeOutput>;
}
