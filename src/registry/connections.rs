use super::models::{ConnectionId, ViewerId};
use crate::relay::ConnectionHandle;
use std::collections::HashMap;

/// Connections attached to one stream
#[derive(Debug, Default)]
struct ConnectionSet {
    broadcaster: Option<ConnectionHandle>,
    viewers: HashMap<ViewerId, ConnectionHandle>,
}

impl ConnectionSet {
    fn is_empty(&self) -> bool {
        self.broadcaster.is_none() && self.viewers.is_empty()
    }
}

/// Bookkeeping of live connection handles per role
///
/// Every unregister operation is idempotent and every lookup returns an empty
/// result for an unknown stream.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    streams: HashMap<String, ConnectionSet>,
    dashboards: HashMap<ConnectionId, ConnectionHandle>,
    next_viewer_id: u64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the broadcaster for a stream, returning any handle it displaced
    pub fn register_broadcaster(
        &mut self,
        stream_id: &str,
        conn: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        self.streams
            .entry(stream_id.to_string())
            .or_default()
            .broadcaster
            .replace(conn)
    }

    /// Remove the broadcaster if it is the given connection
    pub fn unregister_broadcaster(&mut self, stream_id: &str, conn_id: ConnectionId) -> bool {
        let Some(set) = self.streams.get_mut(stream_id) else {
            return false;
        };

        let owned = set
            .broadcaster
            .as_ref()
            .is_some_and(|conn| conn.id() == conn_id);
        if owned {
            set.broadcaster = None;
        }
        self.prune(stream_id);
        owned
    }

    /// Register a viewer and issue its identifier
    pub fn register_viewer(&mut self, stream_id: &str, conn: ConnectionHandle) -> ViewerId {
        self.next_viewer_id += 1;
        let viewer_id = ViewerId(self.next_viewer_id);
        self.streams
            .entry(stream_id.to_string())
            .or_default()
            .viewers
            .insert(viewer_id, conn);
        viewer_id
    }

    pub fn unregister_viewer(
        &mut self,
        stream_id: &str,
        viewer_id: ViewerId,
    ) -> Option<ConnectionHandle> {
        let removed = self
            .streams
            .get_mut(stream_id)
            .and_then(|set| set.viewers.remove(&viewer_id));
        self.prune(stream_id);
        removed
    }

    /// Remove and return every viewer of a stream
    pub fn take_viewers(&mut self, stream_id: &str) -> Vec<(ViewerId, ConnectionHandle)> {
        let mut viewers: Vec<_> = self
            .streams
            .get_mut(stream_id)
            .map(|set| set.viewers.drain().collect())
            .unwrap_or_default();
        self.prune(stream_id);
        viewers.sort_by_key(|(id, _)| *id);
        viewers
    }

    pub fn register_dashboard(&mut self, conn: ConnectionHandle) {
        self.dashboards.insert(conn.id(), conn);
    }

    pub fn unregister_dashboard(&mut self, conn_id: ConnectionId) -> bool {
        self.dashboards.remove(&conn_id).is_some()
    }

    pub fn broadcaster_of(&self, stream_id: &str) -> Option<&ConnectionHandle> {
        self.streams
            .get(stream_id)
            .and_then(|set| set.broadcaster.as_ref())
    }

    pub fn viewer(&self, stream_id: &str, viewer_id: ViewerId) -> Option<&ConnectionHandle> {
        self.streams
            .get(stream_id)
            .and_then(|set| set.viewers.get(&viewer_id))
    }

    /// Viewers of a stream, ordered by join
    pub fn viewers_of(&self, stream_id: &str) -> Vec<(ViewerId, &ConnectionHandle)> {
        let mut viewers: Vec<_> = self
            .streams
            .get(stream_id)
            .map(|set| set.viewers.iter().map(|(id, conn)| (*id, conn)).collect())
            .unwrap_or_default();
        viewers.sort_by_key(|(id, _)| *id);
        viewers
    }

    pub fn dashboards(&self) -> impl Iterator<Item = &ConnectionHandle> {
        self.dashboards.values()
    }

    pub fn dashboard_count(&self) -> usize {
        self.dashboards.len()
    }

    fn prune(&mut self, stream_id: &str) {
        if self.streams.get(stream_id).is_some_and(ConnectionSet::is_empty) {
            self.streams.remove(stream_id);
        }
    }
}
