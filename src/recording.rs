//! Recording intake
//!
//! Bridges the blob store and the relay: uploaded recordings are persisted by
//! the store and then folded into the stream registry as completed streams.
//! Blob I/O always happens outside the relay lock.

use crate::error::{RelayError, Result};
use crate::registry::{Artifact, CompletedStream, RecordingMeta};
use crate::relay::Relay;
use crate::storage::BlobStore;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct RecordingIntake {
    relay: Relay,
    store: Arc<dyn BlobStore>,
}

impl RecordingIntake {
    pub fn new(relay: Relay, store: Arc<dyn BlobStore>) -> Self {
        Self { relay, store }
    }

    /// Record a stream whose artifact the blob store already holds
    pub async fn complete(&self, meta: RecordingMeta, artifact: Artifact) -> Result<CompletedStream> {
        validate(&meta)?;
        Ok(self.record(meta, artifact).await)
    }

    /// Persist uploaded video bytes, then record the completed stream
    pub async fn ingest(&self, meta: RecordingMeta, video: &[u8]) -> Result<CompletedStream> {
        validate(&meta)?;

        let artifact = self.store.put(&meta.stream_id, video).await?;
        info!(
            "Stored {} byte recording for {} in {} store",
            video.len(),
            meta.stream_id,
            self.store.name()
        );

        Ok(self.record(meta, artifact).await)
    }

    /// Store the completed record and drop the artifact of any record it replaced
    async fn record(&self, meta: RecordingMeta, artifact: Artifact) -> CompletedStream {
        let (completed, displaced) = self.relay.complete_recording(meta, artifact).await;

        if let Some(old) = displaced {
            let old_artifact = old.artifact();
            if old_artifact != completed.artifact() {
                match self.store.delete(&old_artifact).await {
                    Ok(()) => info!("Replaced recording {} for {}", old.video_filename, old.id),
                    Err(e) => warn!(
                        "Replaced recording {} for {} not removed: {:#}",
                        old.video_filename, old.id, e
                    ),
                }
            }
        }

        completed
    }

    /// Delete a completed stream and its artifact
    ///
    /// The record is taken out of the registry before its artifact is deleted,
    /// so an upload under the same id that lands meanwhile is left alone. The
    /// record stays removed when the blob store fails; that failure is then
    /// returned as [`RelayError::ArtifactRemoval`].
    pub async fn delete(&self, id: &str) -> Result<()> {
        let record = self.relay.delete_completed(id).await?;

        self.store.delete(&record.artifact()).await.map_err(|source| {
            error!("Artifact {} for {} not removed: {:#}", record.video_filename, id, source);
            RelayError::ArtifactRemoval {
                id: id.to_string(),
                source,
            }
        })
    }
}

fn validate(meta: &RecordingMeta) -> Result<()> {
    if meta.stream_id.trim().is_empty() {
        return Err(RelayError::InvalidRecording("stream_id is empty".to_string()));
    }
    if !meta.duration_seconds.is_finite() || meta.duration_seconds < 0.0 {
        return Err(RelayError::InvalidRecording(format!(
            "duration_seconds {} is not a valid duration",
            meta.duration_seconds
        )));
    }
    if !meta.latitude.is_finite() || !meta.longitude.is_finite() {
        return Err(RelayError::InvalidRecording("location is not finite".to_string()));
    }
    if meta.ended_at < meta.started_at {
        return Err(RelayError::InvalidRecording(
            "ended_at is before started_at".to_string(),
        ));
    }
    Ok(())
}
