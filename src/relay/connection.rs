use super::messages::ServerMessage;
use crate::registry::ConnectionId;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Why a message could not be queued for a connection
#[derive(Debug, Error)]
pub enum SendError {
    /// The connection's writer has gone away
    #[error("connection closed")]
    Closed,

    /// The connection is not draining its queue fast enough
    #[error("outbound queue full")]
    Full,

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Sending half of one connection's outbound queue
///
/// Every message for a socket goes through this queue and a single writer task
/// drains it, so writes to one socket never interleave. Queueing never blocks,
/// which keeps sends safe to perform while the relay lock is held.
///
/// When a message that must not be lost cannot be queued, the relay calls
/// `shutdown` instead and the socket loop closes the connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
    shutdown: CancellationToken,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its writer task drains
    pub fn channel(id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id,
            tx,
            shutdown: CancellationToken::new(),
        };
        (handle, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn send(&self, message: &ServerMessage) -> Result<(), SendError> {
        let text = serde_json::to_string(message)?;
        self.send_text(text)
    }

    /// Queue already-encoded text, used when one payload fans out to many connections
    pub fn send_text(&self, text: String) -> Result<(), SendError> {
        self.tx.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Ask the socket loop to drop this connection
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token the socket loop waits on; cancelled by [`ConnectionHandle::shutdown`]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
