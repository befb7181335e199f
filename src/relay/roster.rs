use super::connection::SendError;
use super::messages::ServerMessage;
use crate::registry::{ConnectionRegistry, StreamRegistry};
use tracing::{debug, error, info, warn};

/// Outcome of one roster publish cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Dashboards the roster was queued for
    pub delivered: usize,

    /// Dashboards that could not take the roster; unregistered and shut down
    pub pruned: usize,
}

pub(super) fn roster_message(streams: &StreamRegistry) -> ServerMessage {
    let roster = streams.roster();
    ServerMessage::StreamList {
        streams: roster.streams,
        past_streams: roster.past_streams,
    }
}

/// Send the current roster to every dashboard
///
/// The roster is encoded once and fanned out. A failure for one dashboard never
/// stops delivery to the others. Any dashboard that cannot take the roster,
/// closed or lagging, is dropped from the registry before returning and its
/// connection is shut down so the client reconnects for a fresh snapshot.
pub(super) fn publish(connections: &mut ConnectionRegistry, streams: &StreamRegistry) -> PublishReport {
    let mut report = PublishReport::default();

    let text = match serde_json::to_string(&roster_message(streams)) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to encode roster: {}", e);
            return report;
        }
    };

    let mut dead = Vec::new();
    for conn in connections.dashboards() {
        match conn.send_text(text.clone()) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                match e {
                    SendError::Full => warn!("Dashboard {} is lagging, dropping it", conn.id()),
                    _ => debug!("Dashboard {} unreachable: {}", conn.id(), e),
                }
                conn.shutdown();
                dead.push(conn.id());
            }
        }
    }

    for conn_id in dead {
        if connections.unregister_dashboard(conn_id) {
            info!("Pruned dead dashboard {}", conn_id);
            report.pruned += 1;
        }
    }

    report
}
