//! Local filesystem blob store
//!
//! Recordings are written flat into one directory as
//! `<stream_id>_<8 hex chars>.webm` and served from `<url_prefix>/<filename>`.

use anyhow::{bail, Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::BlobStore;
use crate::registry::Artifact;

/// Configuration for local blob storage
#[derive(Debug, Clone)]
pub struct LocalBlobStoreConfig {
    /// Directory recordings are written to
    pub root_path: PathBuf,
    /// URL path the directory is served under
    pub url_prefix: String,
}

impl Default for LocalBlobStoreConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("recordings"),
            url_prefix: "/recordings".to_string(),
        }
    }
}

/// Filesystem-backed blob store
pub struct LocalBlobStore {
    config: LocalBlobStoreConfig,
}

impl LocalBlobStore {
    pub fn new(config: LocalBlobStoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.root_path).with_context(|| {
            format!(
                "Failed to create recordings directory {}",
                config.root_path.display()
            )
        })?;

        info!("Local blob store at {}", config.root_path.display());
        Ok(Self { config })
    }

    pub fn root_path(&self) -> &Path {
        &self.config.root_path
    }

    fn url_for(&self, filename: &str) -> String {
        format!("{}/{}", self.config.url_prefix.trim_end_matches('/'), filename)
    }

    fn path_for(&self, filename: &str) -> Result<PathBuf> {
        if filename.is_empty() || filename.contains(['/', '\\']) || filename.starts_with('.') {
            bail!("Refusing artifact filename {:?}", filename);
        }
        Ok(self.config.root_path.join(filename))
    }
}

/// Reduce a stream id to characters that are safe in a filename
pub fn sanitize_stream_id(stream_id: &str) -> String {
    let cleaned: String = stream_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "stream".to_string()
    } else {
        cleaned
    }
}

#[async_trait::async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, stream_id: &str, data: &[u8]) -> Result<Artifact> {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let filename = format!("{}_{}.webm", sanitize_stream_id(stream_id), &suffix[..8]);
        let path = self.path_for(&filename)?;

        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write recording {}", path.display()))?;

        debug!("Wrote {} bytes to {}", data.len(), path.display());

        Ok(Artifact {
            url: self.url_for(&filename),
            filename,
        })
    }

    async fn delete(&self, artifact: &Artifact) -> Result<()> {
        let path = self.path_for(&artifact.filename)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} already gone", path.display());
                Ok(())
            }
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove recording {}", path.display()))
            }
        }
    }

    fn name(&self) -> &str {
        "local"
    }
}
