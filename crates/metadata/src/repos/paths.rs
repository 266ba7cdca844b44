//! Path repository trait: serialized index roots keyed by path.

use crate::error::MetadataResult;
use async_trait::async_trait;

/// Opaque blobs of serialized index roots, keyed by path.
#[async_trait]
pub trait PathRepo: Send + Sync {
    /// Store a serialized index root under `path`, replacing any existing
    /// blob.
    async fn put_index(&self, path: &str, index_blob: &[u8]) -> MetadataResult<()>;

    /// Fetch the blob stored under `path`; a miss is `PathNotExists`.
    async fn get_index(&self, path: &str) -> MetadataResult<Vec<u8>>;

    /// All stored paths with the given prefix, sorted.
    async fn walk_paths(&self, prefix: &str) -> MetadataResult<Vec<String>>;

    /// Remove the blob stored under `path`. Idempotent.
    async fn delete_path(&self, path: &str) -> MetadataResult<()>;
}
