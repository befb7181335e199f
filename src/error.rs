use thiserror::Error;

/// Failures surfaced by relay operations
#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed or unknown inbound message. Logged and ignored by sessions.
    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("stream {0} is not active")]
    StreamNotFound(String),

    #[error("recording {0} not found")]
    RecordingNotFound(String),

    #[error("stream {0} is already active")]
    DuplicateStream(String),

    /// No connection is registered to receive a forwarded message
    #[error("no peer available for {0}")]
    PeerUnavailable(String),

    #[error("invalid recording upload: {0}")]
    InvalidRecording(String),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    /// The metadata record was removed but the blob store failed to drop the artifact
    #[error("recording {id} removed but its artifact could not be deleted: {source:#}")]
    ArtifactRemoval {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl RelayError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RelayError::StreamNotFound(_) | RelayError::RecordingNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
