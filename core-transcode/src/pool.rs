//! Transcode Pool
//!
//! Bounded-concurrency front of the [`Transcoder`] boundary. The sync
//! pipeline stages files one at a time, but conversions are slow enough
//! that up to [`MAX_CONCURRENT_JOBS`] run side by side regardless of
//! staging order; everything beyond that waits on the semaphore.

use bridge_traits::transcode::{TranscodeOutput, TranscodeProgress, Transcoder};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::error::{Result, TranscodeError};

/// Fixed cap on concurrently running conversions.
pub const MAX_CONCURRENT_JOBS: usize = 2;

/// Default target container for devices that only speak MP3 natively.
pub const DEFAULT_TARGET_CONTAINER: &str = "MP3";

/// Bounded-concurrency conversion service
pub struct TranscodePool {
    transcoder: Arc<dyn Transcoder>,
    permits: Arc<Semaphore>,
    target_container: String,
}

impl TranscodePool {
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self::with_target(transcoder, DEFAULT_TARGET_CONTAINER)
    }

    pub fn with_target(transcoder: Arc<dyn Transcoder>, target_container: &str) -> Self {
        Self {
            transcoder,
            permits: Arc::new(Semaphore::new(MAX_CONCURRENT_JOBS)),
            target_container: target_container.to_string(),
        }
    }

    /// Container conversions produce.
    pub fn target_container(&self) -> &str {
        &self.target_container
    }

    /// Convert `input` to the pool's target container.
    ///
    /// Waits for a free slot, then runs the conversion while logging its
    /// incremental progress under `label`. A failure affects only this job.
    pub async fn convert(&self, label: &str, input: Bytes) -> Result<TranscodeOutput> {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| TranscodeError::ConversionFailed(e.to_string()))?;

        info!(label, target = %self.target_container, "Transcoding");

        let (tx, mut rx) = mpsc::channel::<TranscodeProgress>(16);
        let progress_label = label.to_string();
        let drain = tokio::spawn(async move {
            while let Some(progress) = rx.recv().await {
                debug!(
                    label = %progress_label,
                    percent = (progress.fraction * 100.0) as u32,
                    "Transcode progress"
                );
            }
        });

        let result = self
            .transcoder
            .transcode(input, &self.target_container, tx)
            .await;
        drain.abort();

        match result {
            Ok(output) => {
                info!(
                    label,
                    bytes = output.content.len(),
                    container = %output.container,
                    "Transcode complete"
                );
                Ok(output)
            }
            Err(e) => {
                warn!(label, "Transcode failed: {}", e);
                Err(TranscodeError::Bridge(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingTranscoder {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Transcoder for CountingTranscoder {
        async fn transcode(
            &self,
            _input: Bytes,
            target: &str,
            progress: mpsc::Sender<TranscodeProgress>,
        ) -> BridgeResult<TranscodeOutput> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            progress.send(TranscodeProgress { fraction: 0.5 }).await.ok();
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(TranscodeOutput {
                content: Bytes::from_static(b"converted"),
                container: target.to_string(),
                duration_ms: Some(1_000),
                bitrate_kbps: Some(128),
                sample_rate_hz: Some(44_100),
            })
        }
    }

    struct FailingTranscoder;

    #[async_trait]
    impl Transcoder for FailingTranscoder {
        async fn transcode(
            &self,
            _input: Bytes,
            _target: &str,
            _progress: mpsc::Sender<TranscodeProgress>,
        ) -> BridgeResult<TranscodeOutput> {
            Err(BridgeError::OperationFailed("unsupported codec".to_string()))
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let transcoder = Arc::new(CountingTranscoder {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let pool = Arc::new(TranscodePool::new(transcoder.clone()));

        let mut handles = Vec::new();
        for i in 0..6 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                pool.convert(&format!("job-{}", i), Bytes::new()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(transcoder.peak.load(Ordering::SeqCst) <= MAX_CONCURRENT_JOBS);
    }

    #[tokio::test]
    async fn test_failure_surfaces_as_transcode_error() {
        let pool = TranscodePool::new(Arc::new(FailingTranscoder));
        let err = pool.convert("bad", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, TranscodeError::Bridge(_)));
    }

    #[tokio::test]
    async fn test_output_carries_target_container() {
        let pool = TranscodePool::with_target(
            Arc::new(CountingTranscoder {
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
            "MP3",
        );
        let output = pool.convert("one", Bytes::new()).await.unwrap();
        assert_eq!(output.container, "MP3");
    }
}
