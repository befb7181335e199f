use super::connection::ConnectionHandle;
use super::hub::Relay;
use super::messages::{BroadcasterMessage, ServerMessage, ViewerMessage};
use crate::error::{RelayError, Result};
use crate::registry::ViewerId;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

/// Whether a connection should keep reading after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Per-connection protocol driver
///
/// The socket loop feeds every inbound text frame to `handle_text` and calls
/// `finish` once when the loop exits, whatever the reason.
#[async_trait::async_trait]
pub trait Session: Send {
    async fn handle_text(&mut self, text: &str) -> Flow;

    /// Release everything the connection registered. Safe to call more than once.
    async fn finish(&mut self);
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(text)?)
}

// ============================================================================
// Broadcaster
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcasterState {
    AwaitingStart,
    Streaming,
    Ended,
}

/// Session for the device publishing a stream
pub struct BroadcasterSession {
    relay: Relay,
    stream_id: String,
    conn: ConnectionHandle,
    state: BroadcasterState,
}

impl BroadcasterSession {
    pub fn new(relay: Relay, stream_id: String, conn: ConnectionHandle) -> Self {
        debug!("Broadcaster {} connected for stream {}", conn.id(), stream_id);
        Self {
            relay,
            stream_id,
            conn,
            state: BroadcasterState::AwaitingStart,
        }
    }

    pub fn state(&self) -> BroadcasterState {
        self.state
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub async fn handle(&mut self, message: BroadcasterMessage) -> Flow {
        use BroadcasterMessage::*;
        use BroadcasterState::*;

        match (self.state, message) {
            (Ended, _) => Flow::Close,

            (_, StopStream) => {
                self.finish().await;
                Flow::Close
            }

            (AwaitingStart, StartStream { latitude, longitude, notes }) => {
                match self
                    .relay
                    .start_stream(&self.stream_id, &self.conn, latitude, longitude, &notes)
                    .await
                {
                    Ok(_) => self.state = Streaming,
                    Err(e) => {
                        warn!("Rejected start_stream for {}: {}", self.stream_id, e);
                        let code = match e {
                            RelayError::DuplicateStream(_) => "duplicate_stream",
                            _ => "start_failed",
                        };
                        if let Err(e) = self.conn.send(&ServerMessage::error(code, e.to_string())) {
                            debug!("Broadcaster {} missed error reply: {}", self.conn.id(), e);
                        }
                    }
                }
                Flow::Continue
            }

            (Streaming, StartStream { .. }) => {
                warn!("Stream {} is already streaming, start_stream ignored", self.stream_id);
                Flow::Continue
            }

            (Streaming, UpdateLocation { latitude, longitude }) => {
                self.relay
                    .update_location(&self.stream_id, self.conn.id(), latitude, longitude)
                    .await;
                Flow::Continue
            }

            (Streaming, Offer { sdp, viewer_id }) => {
                let delivered = self.relay.relay_offer(&self.stream_id, sdp, viewer_id).await;
                debug!("Offer on {} queued for {} viewer(s)", self.stream_id, delivered);
                Flow::Continue
            }

            (Streaming, IceCandidate { candidate, viewer_id }) => {
                self.relay
                    .relay_broadcaster_candidate(&self.stream_id, candidate, viewer_id)
                    .await;
                Flow::Continue
            }

            (AwaitingStart, other) => {
                debug!(
                    "Ignoring {} on {} before start_stream",
                    other.kind(),
                    self.stream_id
                );
                Flow::Continue
            }
        }
    }
}

#[async_trait::async_trait]
impl Session for BroadcasterSession {
    async fn handle_text(&mut self, text: &str) -> Flow {
        match decode::<BroadcasterMessage>(text) {
            Ok(message) => self.handle(message).await,
            Err(e) => {
                warn!("Broadcaster of {} sent a bad message: {}", self.stream_id, e);
                Flow::Continue
            }
        }
    }

    async fn finish(&mut self) {
        if std::mem::replace(&mut self.state, BroadcasterState::Ended) == BroadcasterState::Ended {
            return;
        }

        // Runs whether or not start_stream succeeded; the relay ignores a
        // connection that never owned the stream.
        if self
            .relay
            .end_stream(&self.stream_id, self.conn.id())
            .await
            .is_none()
        {
            debug!("Broadcaster {} closed without an active stream", self.conn.id());
        }
    }
}

// ============================================================================
// Viewer
// ============================================================================

/// Session for a client watching a stream
pub struct ViewerSession {
    relay: Relay,
    stream_id: String,
    viewer_id: ViewerId,
    attached: bool,

    // Keeps the outbound queue open for the session's lifetime
    _conn: ConnectionHandle,
}

impl ViewerSession {
    /// Join an active stream
    ///
    /// If the stream is not active the viewer is sent `stream_not_found`, is
    /// never registered, and the error is returned so the caller can close.
    pub async fn join(relay: Relay, stream_id: String, conn: ConnectionHandle) -> Result<Self> {
        match relay.join_viewer(&stream_id, &conn).await {
            Ok(viewer_id) => Ok(Self {
                relay,
                stream_id,
                viewer_id,
                attached: true,
                _conn: conn,
            }),
            Err(e) => {
                info!("Viewer {} refused: {}", conn.id(), e);
                let reply = ServerMessage::StreamNotFound {
                    message: "Stream not found".to_string(),
                };
                if let Err(e) = conn.send(&reply) {
                    debug!("Viewer {} missed stream_not_found: {}", conn.id(), e);
                }
                Err(e)
            }
        }
    }

    pub fn viewer_id(&self) -> ViewerId {
        self.viewer_id
    }

    pub async fn handle(&mut self, message: ViewerMessage) -> Flow {
        let forwarded = match message {
            ViewerMessage::Answer { sdp } => {
                self.relay
                    .forward_answer(&self.stream_id, self.viewer_id, sdp)
                    .await
            }
            ViewerMessage::IceCandidate { candidate } => {
                self.relay
                    .forward_viewer_candidate(&self.stream_id, self.viewer_id, candidate)
                    .await
            }
        };

        if let Err(e) = forwarded {
            debug!("Dropped message from viewer {}: {}", self.viewer_id, e);
        }
        Flow::Continue
    }
}

#[async_trait::async_trait]
impl Session for ViewerSession {
    async fn handle_text(&mut self, text: &str) -> Flow {
        match decode::<ViewerMessage>(text) {
            Ok(message) => self.handle(message).await,
            Err(e) => {
                warn!("Viewer {} sent a bad message: {}", self.viewer_id, e);
                Flow::Continue
            }
        }
    }

    async fn finish(&mut self) {
        if std::mem::take(&mut self.attached) {
            self.relay.leave_viewer(&self.stream_id, self.viewer_id).await;
        }
    }
}

// ============================================================================
// Dashboard
// ============================================================================

/// Session for a roster observer
pub struct DashboardSession {
    relay: Relay,
    conn: ConnectionHandle,
    attached: bool,
}

impl DashboardSession {
    /// Register the dashboard; it receives the current roster straight away
    pub async fn attach(relay: Relay, conn: ConnectionHandle) -> Self {
        relay.attach_dashboard(&conn).await;
        Self {
            relay,
            conn,
            attached: true,
        }
    }
}

#[async_trait::async_trait]
impl Session for DashboardSession {
    async fn handle_text(&mut self, _text: &str) -> Flow {
        // Heartbeats and anything else from a dashboard carry no meaning
        Flow::Continue
    }

    async fn finish(&mut self) {
        if std::mem::take(&mut self.attached) {
            self.relay.detach_dashboard(self.conn.id()).await;
        }
    }
}
