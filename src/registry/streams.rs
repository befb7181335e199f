use super::models::{Artifact, CompletedStream, RecordingMeta, Roster, StreamSession};
use crate::error::{RelayError, Result};
use chrono::Utc;
use std::collections::HashMap;

/// Authoritative record of active and completed streams
#[derive(Debug, Default)]
pub struct StreamRegistry {
    active: HashMap<String, StreamSession>,
    completed: HashMap<String, CompletedStream>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an active session. An id that is already active is rejected and
    /// the existing session is left untouched.
    pub fn start_stream(
        &mut self,
        id: &str,
        latitude: f64,
        longitude: f64,
        notes: &str,
    ) -> Result<StreamSession> {
        if self.active.contains_key(id) {
            return Err(RelayError::DuplicateStream(id.to_string()));
        }

        let session = StreamSession {
            id: id.to_string(),
            started_at: Utc::now(),
            latitude,
            longitude,
            notes: notes.to_string(),
            is_active: true,
        };
        self.active.insert(id.to_string(), session.clone());
        Ok(session)
    }

    /// Move an active stream to a new location. Returns false if it is not active.
    pub fn update_location(&mut self, id: &str, latitude: f64, longitude: f64) -> bool {
        match self.active.get_mut(id) {
            Some(session) => {
                session.latitude = latitude;
                session.longitude = longitude;
                true
            }
            None => false,
        }
    }

    pub fn end_stream(&mut self, id: &str) -> Option<StreamSession> {
        self.active.remove(id)
    }

    /// Store a completed recording, replacing any earlier record with the same id
    ///
    /// Returns the stored record and the one it displaced, whose artifact is
    /// now unreferenced.
    pub fn complete_recording(
        &mut self,
        meta: RecordingMeta,
        artifact: Artifact,
    ) -> (CompletedStream, Option<CompletedStream>) {
        let completed = CompletedStream::from_recording(meta, artifact);
        let displaced = self
            .completed
            .insert(completed.id.clone(), completed.clone());
        (completed, displaced)
    }

    pub fn delete_completed(&mut self, id: &str) -> Result<CompletedStream> {
        self.completed
            .remove(id)
            .ok_or_else(|| RelayError::RecordingNotFound(id.to_string()))
    }

    pub fn active(&self, id: &str) -> Option<&StreamSession> {
        self.active.get(id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    pub fn completed(&self, id: &str) -> Option<&CompletedStream> {
        self.completed.get(id)
    }

    /// Active sessions, oldest first
    pub fn active_streams(&self) -> Vec<StreamSession> {
        let mut streams: Vec<_> = self.active.values().cloned().collect();
        streams.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        streams
    }

    /// Completed streams, oldest first
    pub fn completed_streams(&self) -> Vec<CompletedStream> {
        let mut streams: Vec<_> = self.completed.values().cloned().collect();
        streams.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        streams
    }

    pub fn roster(&self) -> Roster {
        Roster {
            streams: self.active_streams(),
            past_streams: self.completed_streams(),
        }
    }
}
