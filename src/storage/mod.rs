//! Storage for recorded stream artifacts
//!
//! The relay never touches video bytes itself; it hands them to a `BlobStore`
//! and keeps only the returned `Artifact` reference.

pub mod local;

use crate::registry::Artifact;
use anyhow::Result;

/// Blob store backend trait
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist a recording for a stream and return where it lives
    async fn put(&self, stream_id: &str, data: &[u8]) -> Result<Artifact>;

    /// Remove a stored artifact. Removing one that is already gone succeeds.
    async fn delete(&self, artifact: &Artifact) -> Result<()>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

pub use local::{LocalBlobStore, LocalBlobStoreConfig};
