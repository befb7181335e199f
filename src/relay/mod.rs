//! Signaling relay
//!
//! This module coordinates WebRTC setup between one broadcaster and its viewers
//! per stream, and keeps dashboards in sync with the stream roster:
//! - `Relay`: shared hub owning the registries behind one lock
//! - `ConnectionHandle`: per-connection outbound queue
//! - sessions: broadcaster, viewer and dashboard protocol drivers
//! - messages: the JSON wire protocol

mod connection;
mod hub;
pub mod messages;
mod roster;
mod signaling;

pub use connection::{ConnectionHandle, SendError};
pub use hub::Relay;
pub use messages::{BroadcasterMessage, ServerMessage, ViewerMessage};
pub use roster::PublishReport;
pub use signaling::{
    BroadcasterSession, BroadcasterState, DashboardSession, Flow, Session, ViewerSession,
};
