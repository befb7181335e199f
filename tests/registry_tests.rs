// Unit tests for the connection and stream registries
//
// The registries are plain data structures; these tests exercise their
// bookkeeping without any locking or sockets.

use chrono::{TimeZone, Utc};
use signal_relay::{
    Artifact, ConnectionHandle, ConnectionId, ConnectionRegistry, RecordingMeta, RelayError,
    StreamRegistry,
};

fn handle(id: u64) -> ConnectionHandle {
    ConnectionHandle::channel(ConnectionId(id), 8).0
}

fn meta(stream_id: &str, notes: &str) -> RecordingMeta {
    RecordingMeta {
        stream_id: stream_id.to_string(),
        started_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        ended_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 5, 0).unwrap(),
        latitude: 1.0,
        longitude: 2.0,
        notes: notes.to_string(),
        duration_seconds: 300.0,
    }
}

fn artifact(name: &str) -> Artifact {
    Artifact {
        filename: name.to_string(),
        url: format!("/recordings/{}", name),
    }
}

// ============================================================================
// StreamRegistry
// ============================================================================

#[test]
fn test_start_then_end_stream() {
    let mut streams = StreamRegistry::new();

    let session = streams.start_stream("s1", 1.0, 2.0, "north gate").unwrap();
    assert_eq!(session.id, "s1");
    assert!(session.is_active);
    assert!(streams.is_active("s1"));

    let ended = streams.end_stream("s1").expect("stream should be active");
    assert_eq!(ended.notes, "north gate");
    assert!(!streams.is_active("s1"));
    assert!(streams.active_streams().is_empty());

    assert!(streams.end_stream("s1").is_none(), "second end is absent");
}

#[test]
fn test_duplicate_start_keeps_original_session() {
    let mut streams = StreamRegistry::new();
    streams.start_stream("s1", 1.0, 2.0, "first").unwrap();

    let err = streams.start_stream("s1", 9.0, 9.0, "second").unwrap_err();
    assert!(matches!(err, RelayError::DuplicateStream(ref id) if id == "s1"));

    let session = streams.active("s1").unwrap();
    assert_eq!(session.latitude, 1.0);
    assert_eq!(session.longitude, 2.0);
    assert_eq!(session.notes, "first");
}

#[test]
fn test_update_location_on_unknown_stream_is_noop() {
    let mut streams = StreamRegistry::new();
    assert!(!streams.update_location("missing", 5.0, 6.0));

    streams.start_stream("s1", 1.0, 2.0, "").unwrap();
    assert!(streams.update_location("s1", 5.0, 6.0));
    let session = streams.active("s1").unwrap();
    assert_eq!((session.latitude, session.longitude), (5.0, 6.0));
}

#[test]
fn test_complete_recording_is_last_write_wins() {
    let mut streams = StreamRegistry::new();

    let (_, displaced) = streams.complete_recording(meta("s1", "take one"), artifact("a.webm"));
    assert!(displaced.is_none());

    let (_, displaced) = streams.complete_recording(meta("s1", "take two"), artifact("b.webm"));
    assert_eq!(displaced.unwrap().artifact(), artifact("a.webm"));

    let completed = streams.completed_streams();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].notes, "take two");
    assert_eq!(completed[0].video_filename, "b.webm");
    assert_eq!(completed[0].video_url, "/recordings/b.webm");
}

#[test]
fn test_delete_completed() {
    let mut streams = StreamRegistry::new();

    let err = streams.delete_completed("missing").unwrap_err();
    assert!(err.is_not_found());

    streams.complete_recording(meta("s1", ""), artifact("a.webm"));
    streams.delete_completed("s1").unwrap();
    assert!(streams.completed("s1").is_none());
    assert!(streams.roster().past_streams.is_empty());
}

#[test]
fn test_completed_stream_without_prior_session() {
    let mut streams = StreamRegistry::new();
    streams.complete_recording(meta("never-live", ""), artifact("x.webm"));

    let roster = streams.roster();
    assert!(roster.streams.is_empty());
    assert_eq!(roster.past_streams[0].id, "never-live");
}

// ============================================================================
// ConnectionRegistry
// ============================================================================

#[test]
fn test_lookups_on_unknown_stream_are_empty() {
    let connections = ConnectionRegistry::new();
    assert!(connections.broadcaster_of("nope").is_none());
    assert!(connections.viewers_of("nope").is_empty());
}

#[test]
fn test_viewer_ids_are_unique_and_stable() {
    let mut connections = ConnectionRegistry::new();

    let a = connections.register_viewer("s1", handle(1));
    let b = connections.register_viewer("s1", handle(2));
    let c = connections.register_viewer("s2", handle(3));
    assert_ne!(a, b);
    assert_ne!(b, c);

    // Releasing a viewer never lets its id be reissued
    connections.unregister_viewer("s1", a);
    let d = connections.register_viewer("s1", handle(4));
    assert_ne!(a, d);

    let ids: Vec<_> = connections.viewers_of("s1").into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![b, d]);
    assert_eq!(connections.viewer("s1", b).unwrap().id(), ConnectionId(2));
}

#[test]
fn test_unregister_is_idempotent() {
    let mut connections = ConnectionRegistry::new();

    let viewer = connections.register_viewer("s1", handle(1));
    assert!(connections.unregister_viewer("s1", viewer).is_some());
    assert!(connections.unregister_viewer("s1", viewer).is_none());

    connections.register_dashboard(handle(2));
    assert!(connections.unregister_dashboard(ConnectionId(2)));
    assert!(!connections.unregister_dashboard(ConnectionId(2)));

    assert!(!connections.unregister_broadcaster("s1", ConnectionId(3)));
}

#[test]
fn test_unregister_broadcaster_requires_owner() {
    let mut connections = ConnectionRegistry::new();
    connections.register_broadcaster("s1", handle(1));

    assert!(!connections.unregister_broadcaster("s1", ConnectionId(2)));
    assert_eq!(connections.broadcaster_of("s1").unwrap().id(), ConnectionId(1));

    assert!(connections.unregister_broadcaster("s1", ConnectionId(1)));
    assert!(connections.broadcaster_of("s1").is_none());
}

#[test]
fn test_take_viewers_clears_set() {
    let mut connections = ConnectionRegistry::new();
    connections.register_broadcaster("s1", handle(1));
    connections.register_viewer("s1", handle(2));
    connections.register_viewer("s1", handle(3));

    let taken = connections.take_viewers("s1");
    assert_eq!(taken.len(), 2);
    assert!(connections.viewers_of("s1").is_empty());
    assert!(connections.broadcaster_of("s1").is_some());
    assert!(connections.take_viewers("s1").is_empty());
}
