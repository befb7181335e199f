pub mod config;
pub mod error;
pub mod http;
pub mod recording;
pub mod registry;
pub mod relay;
pub mod storage;

pub use config::Config;
pub use error::{RelayError, Result};
pub use http::{create_router, AppState};
pub use recording::RecordingIntake;
pub use registry::{
    Artifact, CompletedStream, ConnectionId, ConnectionRegistry, RecordingMeta, Roster,
    StreamRegistry, StreamSession, ViewerId,
};
pub use relay::{
    BroadcasterMessage, BroadcasterSession, ConnectionHandle, DashboardSession, Relay,
    ServerMessage, Session, ViewerMessage, ViewerSession,
};
pub use storage::{BlobStore, LocalBlobStore, LocalBlobStoreConfig};
