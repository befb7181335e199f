use super::connection::ConnectionHandle;
use super::messages::ServerMessage;
use super::roster::{self, PublishReport};
use crate::error::{RelayError, Result};
use crate::registry::{
    Artifact, CompletedStream, ConnectionId, ConnectionRegistry, RecordingMeta, Roster,
    StreamRegistry, StreamSession, ViewerId,
};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Everything the relay mutates, guarded by one lock
#[derive(Debug, Default)]
struct RelayState {
    connections: ConnectionRegistry,
    streams: StreamRegistry,
}

impl RelayState {
    fn publish(&mut self) -> PublishReport {
        roster::publish(&mut self.connections, &self.streams)
    }
}

/// Process-wide signaling hub
///
/// Owns the connection and stream registries behind a single mutex, so every
/// operation below is serialised against every other. Operations only queue
/// messages on connection handles while the lock is held; socket I/O happens in
/// each connection's writer task.
#[derive(Clone)]
pub struct Relay {
    state: Arc<Mutex<RelayState>>,
    next_connection_id: Arc<AtomicU64>,
    outbound_buffer: usize,
}

impl Relay {
    /// Create a relay whose connections queue at most `outbound_buffer` messages
    pub fn new(outbound_buffer: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(RelayState::default())),
            next_connection_id: Arc::new(AtomicU64::new(1)),
            outbound_buffer,
        }
    }

    /// Allocate a handle for a newly accepted connection
    pub fn open_connection(&self) -> (ConnectionHandle, mpsc::Receiver<String>) {
        let id = ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
        ConnectionHandle::channel(id, self.outbound_buffer)
    }

    // ------------------------------------------------------------------
    // Broadcaster side
    // ------------------------------------------------------------------

    /// Register a new stream owned by `conn`, acknowledge it and republish the roster
    pub async fn start_stream(
        &self,
        stream_id: &str,
        conn: &ConnectionHandle,
        latitude: f64,
        longitude: f64,
        notes: &str,
    ) -> Result<StreamSession> {
        let mut state = self.state.lock().await;

        let session = state
            .streams
            .start_stream(stream_id, latitude, longitude, notes)?;

        if let Some(previous) = state
            .connections
            .register_broadcaster(stream_id, conn.clone())
        {
            warn!(
                "Stream {} had a stale broadcaster {} registered, replaced by {}",
                stream_id,
                previous.id(),
                conn.id()
            );
        }

        let ack = ServerMessage::StreamStarted {
            stream_id: stream_id.to_string(),
        };
        if let Err(e) = conn.send(&ack) {
            warn!("Failed to acknowledge stream {}: {}", stream_id, e);
        }

        info!(
            "Stream {} started by {} at ({}, {})",
            stream_id,
            conn.id(),
            latitude,
            longitude
        );

        state.publish();
        Ok(session)
    }

    /// Move a stream owned by `conn_id`. A no-op returning false otherwise.
    pub async fn update_location(
        &self,
        stream_id: &str,
        conn_id: ConnectionId,
        latitude: f64,
        longitude: f64,
    ) -> bool {
        let mut state = self.state.lock().await;

        if !owns_stream(&state.connections, stream_id, conn_id) {
            return false;
        }
        if !state.streams.update_location(stream_id, latitude, longitude) {
            return false;
        }

        debug!("Stream {} moved to ({}, {})", stream_id, latitude, longitude);
        state.publish();
        true
    }

    /// Forward an SDP offer to one viewer, or to every current viewer when
    /// `target` is `None`. Returns how many viewers it was queued for.
    pub async fn relay_offer(&self, stream_id: &str, sdp: Value, target: Option<ViewerId>) -> usize {
        let state = self.state.lock().await;
        let message = ServerMessage::Offer {
            sdp,
            stream_id: stream_id.to_string(),
            viewer_id: target,
        };
        fan_out_to_viewers(&state.connections, stream_id, target, &message)
    }

    /// Forward a broadcaster ICE candidate, addressed like [`Relay::relay_offer`]
    pub async fn relay_broadcaster_candidate(
        &self,
        stream_id: &str,
        candidate: Value,
        target: Option<ViewerId>,
    ) -> usize {
        let state = self.state.lock().await;
        let message = ServerMessage::IceCandidate {
            candidate,
            stream_id: Some(stream_id.to_string()),
            viewer_id: target,
        };
        fan_out_to_viewers(&state.connections, stream_id, target, &message)
    }

    /// Tear down a stream owned by `conn_id`
    ///
    /// Removes the session and the broadcaster, tells every viewer the stream
    /// ended, clears the viewer set and republishes the roster. If `conn_id`
    /// never owned the stream nothing changes and `None` is returned.
    pub async fn end_stream(&self, stream_id: &str, conn_id: ConnectionId) -> Option<StreamSession> {
        let mut state = self.state.lock().await;

        if !owns_stream(&state.connections, stream_id, conn_id) {
            debug!("{} does not own stream {}, nothing to end", conn_id, stream_id);
            return None;
        }

        let session = state.streams.end_stream(stream_id);
        state.connections.unregister_broadcaster(stream_id, conn_id);

        let ended = ServerMessage::StreamEnded {
            stream_id: stream_id.to_string(),
        };
        let viewers = state.connections.take_viewers(stream_id);
        for (viewer_id, conn) in &viewers {
            // A viewer that cannot be told the stream ended is disconnected
            // instead of being left open on a dead stream.
            if let Err(e) = conn.send(&ended) {
                warn!("Viewer {} missed stream_ended, closing: {}", viewer_id, e);
                conn.shutdown();
            }
        }

        info!(
            "Stream {} ended, notified {} viewer(s)",
            stream_id,
            viewers.len()
        );

        state.publish();
        session
    }

    // ------------------------------------------------------------------
    // Viewer side
    // ------------------------------------------------------------------

    /// Attach a viewer to an active stream and ask the broadcaster for an offer
    pub async fn join_viewer(&self, stream_id: &str, conn: &ConnectionHandle) -> Result<ViewerId> {
        let mut state = self.state.lock().await;

        if !state.streams.is_active(stream_id) {
            return Err(RelayError::StreamNotFound(stream_id.to_string()));
        }

        let viewer_id = state.connections.register_viewer(stream_id, conn.clone());
        info!("Viewer {} joined stream {} on {}", viewer_id, stream_id, conn.id());

        match state.connections.broadcaster_of(stream_id) {
            Some(broadcaster) => {
                if let Err(e) = broadcaster.send(&ServerMessage::ViewerJoined { viewer_id }) {
                    debug!("Broadcaster of {} missed viewer_joined: {}", stream_id, e);
                }
            }
            None => debug!("Stream {} has no broadcaster to notify", stream_id),
        }

        Ok(viewer_id)
    }

    /// Forward a viewer's SDP answer to the broadcaster
    pub async fn forward_answer(&self, stream_id: &str, viewer_id: ViewerId, sdp: Value) -> Result<()> {
        let state = self.state.lock().await;
        send_to_broadcaster(
            &state.connections,
            stream_id,
            viewer_id,
            &ServerMessage::Answer { sdp, viewer_id },
        )
    }

    /// Forward a viewer's ICE candidate to the broadcaster
    pub async fn forward_viewer_candidate(
        &self,
        stream_id: &str,
        viewer_id: ViewerId,
        candidate: Value,
    ) -> Result<()> {
        let state = self.state.lock().await;
        send_to_broadcaster(
            &state.connections,
            stream_id,
            viewer_id,
            &ServerMessage::IceCandidate {
                candidate,
                stream_id: None,
                viewer_id: Some(viewer_id),
            },
        )
    }

    /// Detach a viewer. The broadcaster is not told.
    pub async fn leave_viewer(&self, stream_id: &str, viewer_id: ViewerId) -> bool {
        let mut state = self.state.lock().await;
        let removed = state
            .connections
            .unregister_viewer(stream_id, viewer_id)
            .is_some();
        if removed {
            info!("Viewer {} left stream {}", viewer_id, stream_id);
        }
        removed
    }

    // ------------------------------------------------------------------
    // Dashboards and roster
    // ------------------------------------------------------------------

    /// Subscribe a dashboard and send it the current roster
    pub async fn attach_dashboard(&self, conn: &ConnectionHandle) {
        let mut state = self.state.lock().await;

        if let Err(e) = conn.send(&roster::roster_message(&state.streams)) {
            warn!("Failed to send initial roster to {}: {}", conn.id(), e);
        }
        state.connections.register_dashboard(conn.clone());

        info!(
            "Dashboard {} attached ({} total)",
            conn.id(),
            state.connections.dashboard_count()
        );
    }

    pub async fn detach_dashboard(&self, conn_id: ConnectionId) -> bool {
        let mut state = self.state.lock().await;
        let removed = state.connections.unregister_dashboard(conn_id);
        if removed {
            info!("Dashboard {} detached", conn_id);
        }
        removed
    }

    /// Push the current roster to every dashboard
    pub async fn publish(&self) -> PublishReport {
        self.state.lock().await.publish()
    }

    // ------------------------------------------------------------------
    // Completed recordings
    // ------------------------------------------------------------------

    /// Record a finished stream whose artifact is already stored
    ///
    /// Also returns the record this one replaced, if any. Its artifact is the
    /// caller's concern.
    pub async fn complete_recording(
        &self,
        meta: RecordingMeta,
        artifact: Artifact,
    ) -> (CompletedStream, Option<CompletedStream>) {
        let mut state = self.state.lock().await;
        let (completed, displaced) = state.streams.complete_recording(meta, artifact);
        info!(
            "Recording for stream {} stored as {}",
            completed.id, completed.video_filename
        );
        state.publish();
        (completed, displaced)
    }

    /// Take a completed record out of the registry and return it. The artifact
    /// is the caller's concern.
    pub async fn delete_completed(&self, id: &str) -> Result<CompletedStream> {
        let mut state = self.state.lock().await;
        let removed = state.streams.delete_completed(id)?;
        info!("Recording for stream {} deleted", id);
        state.publish();
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn active_streams(&self) -> Vec<StreamSession> {
        self.state.lock().await.streams.active_streams()
    }

    pub async fn active_stream(&self, id: &str) -> Option<StreamSession> {
        self.state.lock().await.streams.active(id).cloned()
    }

    pub async fn completed_streams(&self) -> Vec<CompletedStream> {
        self.state.lock().await.streams.completed_streams()
    }

    pub async fn completed_stream(&self, id: &str) -> Option<CompletedStream> {
        self.state.lock().await.streams.completed(id).cloned()
    }

    pub async fn roster(&self) -> Roster {
        self.state.lock().await.streams.roster()
    }

    pub async fn viewer_ids(&self, stream_id: &str) -> Vec<ViewerId> {
        let state = self.state.lock().await;
        state
            .connections
            .viewers_of(stream_id)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    pub async fn broadcaster_of(&self, stream_id: &str) -> Option<ConnectionId> {
        let state = self.state.lock().await;
        state.connections.broadcaster_of(stream_id).map(ConnectionHandle::id)
    }

    pub async fn dashboard_count(&self) -> usize {
        self.state.lock().await.connections.dashboard_count()
    }
}

fn owns_stream(connections: &ConnectionRegistry, stream_id: &str, conn_id: ConnectionId) -> bool {
    connections
        .broadcaster_of(stream_id)
        .is_some_and(|conn| conn.id() == conn_id)
}

fn fan_out_to_viewers(
    connections: &ConnectionRegistry,
    stream_id: &str,
    target: Option<ViewerId>,
    message: &ServerMessage,
) -> usize {
    let recipients = match target {
        Some(viewer_id) => connections
            .viewer(stream_id, viewer_id)
            .map(|conn| vec![(viewer_id, conn)])
            .unwrap_or_default(),
        None => connections.viewers_of(stream_id),
    };

    if recipients.is_empty() {
        debug!("No viewers on stream {} to receive message", stream_id);
        return 0;
    }

    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode message for stream {}: {}", stream_id, e);
            return 0;
        }
    };

    let mut delivered = 0;
    for (viewer_id, conn) in recipients {
        match conn.send_text(text.clone()) {
            Ok(()) => delivered += 1,
            Err(e) => debug!("Viewer {} on stream {} unreachable: {}", viewer_id, stream_id, e),
        }
    }
    delivered
}

fn send_to_broadcaster(
    connections: &ConnectionRegistry,
    stream_id: &str,
    viewer_id: ViewerId,
    message: &ServerMessage,
) -> Result<()> {
    // A viewer whose stream ended is no longer attached and must not reach
    // whoever broadcasts under the same id next.
    if connections.viewer(stream_id, viewer_id).is_none() {
        return Err(RelayError::PeerUnavailable(format!(
            "viewer {} is not attached to stream {}",
            viewer_id, stream_id
        )));
    }

    let broadcaster = connections.broadcaster_of(stream_id).ok_or_else(|| {
        RelayError::PeerUnavailable(format!("broadcaster of stream {}", stream_id))
    })?;

    broadcaster.send(message).map_err(|e| {
        RelayError::PeerUnavailable(format!("broadcaster of stream {}: {}", stream_id, e))
    })
}
