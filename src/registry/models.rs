use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relay-assigned identifier for one socket connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opaque viewer identifier, stable for the lifetime of the viewer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewerId(pub u64);

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live stream, present in the registry only while its broadcaster is streaming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSession {
    /// Caller-supplied stream identifier
    pub id: String,

    /// When the broadcaster sent `start_stream`
    pub started_at: DateTime<Utc>,

    /// Last known location
    pub latitude: f64,
    pub longitude: f64,

    /// Free text supplied by the broadcaster
    pub notes: String,

    /// Always true for a registered session
    pub is_active: bool,
}

/// A finished stream whose recording is held by the blob store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedStream {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub notes: String,
    pub duration_seconds: f64,

    /// Artifact filename inside the blob store
    pub video_filename: String,

    /// Where clients fetch the artifact from
    pub video_url: String,
}

/// End-of-stream metadata sent along with an uploaded recording
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingMeta {
    pub stream_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub notes: String,
    pub duration_seconds: f64,
}

/// Reference to an artifact persisted by the blob store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub url: String,
}

impl CompletedStream {
    pub fn from_recording(meta: RecordingMeta, artifact: Artifact) -> Self {
        Self {
            id: meta.stream_id,
            started_at: meta.started_at,
            ended_at: meta.ended_at,
            latitude: meta.latitude,
            longitude: meta.longitude,
            notes: meta.notes,
            duration_seconds: meta.duration_seconds,
            video_filename: artifact.filename,
            video_url: artifact.url,
        }
    }

    pub fn artifact(&self) -> Artifact {
        Artifact {
            filename: self.video_filename.clone(),
            url: self.video_url.clone(),
        }
    }
}

/// Snapshot of every active and completed stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    pub streams: Vec<StreamSession>,
    pub past_streams: Vec<CompletedStream>,
}
