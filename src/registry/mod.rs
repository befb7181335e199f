//! In-memory registries
//!
//! - `ConnectionRegistry`: live socket handles per role, keyed by stream id
//! - `StreamRegistry`: active sessions and completed recordings
//!
//! Neither type is synchronised on its own; `relay::Relay` owns both behind a
//! single lock.

mod connections;
mod models;
mod streams;

pub use connections::ConnectionRegistry;
pub use models::{
    Artifact, CompletedStream, ConnectionId, RecordingMeta, Roster, StreamSession, ViewerId,
};
pub use streams::StreamRegistry;
