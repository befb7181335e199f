//! HTTP and WebSocket API
//!
//! - GET /streams, /past-streams, /past-streams/:id - Roster queries
//! - DELETE /past-streams/:id - Delete a recording
//! - POST /upload-recording - Multipart recording upload
//! - GET /recordings/* - Stored recordings
//! - WS /ws/dashboard - Roster updates
//! - WS /ws/broadcast/:id - Broadcaster signaling
//! - WS /ws/view/:id - Viewer signaling
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;
mod ws;

pub use handlers::{
    ErrorResponse, PastStreamsResponse, ServiceStatus, StreamsResponse, SuccessResponse,
    UploadResponse,
};
pub use routes::create_router;
pub use state::AppState;
