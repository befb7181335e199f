use crate::config::Config;
use crate::recording::RecordingIntake;
use crate::relay::Relay;
use crate::storage::{LocalBlobStore, LocalBlobStoreConfig};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state for HTTP and WebSocket handlers
#[derive(Clone)]
pub struct AppState {
    /// Signaling hub and registries
    pub relay: Relay,

    /// Upload/delete bridge to the blob store
    pub recordings: RecordingIntake,

    /// Reported by `GET /`
    pub service_name: String,

    /// Directory served as static recordings
    pub recordings_dir: PathBuf,

    /// URL path the recordings directory is mounted at
    pub recordings_url_prefix: String,

    /// Largest accepted upload body
    pub max_upload_bytes: usize,
}

impl AppState {
    /// State backed by a local blob store in `recordings_dir`
    pub fn new(relay: Relay, recordings_dir: PathBuf) -> Result<Self> {
        let store_config = LocalBlobStoreConfig {
            root_path: recordings_dir,
            ..Default::default()
        };
        Self::with_store_config(relay, store_config, "signal-relay", 512 * 1024 * 1024)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let store_config = LocalBlobStoreConfig {
            root_path: config.recordings.path.clone(),
            url_prefix: config.recordings.url_prefix.clone(),
        };
        Self::with_store_config(
            Relay::new(config.relay.outbound_buffer),
            store_config,
            &config.service.name,
            config.recordings.max_upload_bytes,
        )
    }

    fn with_store_config(
        relay: Relay,
        store_config: LocalBlobStoreConfig,
        service_name: &str,
        max_upload_bytes: usize,
    ) -> Result<Self> {
        let recordings_dir = store_config.root_path.clone();
        let recordings_url_prefix = store_config.url_prefix.clone();
        let store = Arc::new(LocalBlobStore::new(store_config)?);

        Ok(Self {
            recordings: RecordingIntake::new(relay.clone(), store),
            relay,
            service_name: service_name.to_string(),
            recordings_dir,
            recordings_url_prefix,
            max_upload_bytes,
        })
    }
}
