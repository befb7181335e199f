use crate::registry::{CompletedStream, StreamSession, ViewerId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages a broadcaster sends to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcasterMessage {
    StartStream {
        #[serde(default)]
        latitude: f64,
        #[serde(default)]
        longitude: f64,
        #[serde(default)]
        notes: String,
    },
    UpdateLocation {
        #[serde(default)]
        latitude: f64,
        #[serde(default)]
        longitude: f64,
    },
    /// SDP offer, addressed to one viewer when `viewer_id` is set
    Offer {
        sdp: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        viewer_id: Option<ViewerId>,
    },
    IceCandidate {
        candidate: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        viewer_id: Option<ViewerId>,
    },
    StopStream,
}

/// Messages a viewer sends to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerMessage {
    Answer { sdp: Value },
    IceCandidate { candidate: Value },
}

/// Messages the relay sends to any connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Acknowledges `start_stream`
    StreamStarted { stream_id: String },

    /// Asks the broadcaster to make an offer for a new viewer
    ViewerJoined { viewer_id: ViewerId },

    Offer {
        sdp: Value,
        stream_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        viewer_id: Option<ViewerId>,
    },

    Answer { sdp: Value, viewer_id: ViewerId },

    /// Broadcaster candidates carry `stream_id`, viewer candidates carry `viewer_id`
    IceCandidate {
        candidate: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        viewer_id: Option<ViewerId>,
    },

    StreamEnded { stream_id: String },

    /// Terminal reply to a viewer whose stream is not active
    StreamNotFound { message: String },

    StreamList {
        streams: Vec<StreamSession>,
        past_streams: Vec<CompletedStream>,
    },

    Error { code: String, message: String },
}

impl ServerMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl BroadcasterMessage {
    /// Wire name of the message, for logging without dumping payloads
    pub fn kind(&self) -> &'static str {
        match self {
            BroadcasterMessage::StartStream { .. } => "start_stream",
            BroadcasterMessage::UpdateLocation { .. } => "update_location",
            BroadcasterMessage::Offer { .. } => "offer",
            BroadcasterMessage::IceCandidate { .. } => "ice_candidate",
            BroadcasterMessage::StopStream => "stop_stream",
        }
    }
}
