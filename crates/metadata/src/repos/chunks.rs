//! Chunk metadata repository trait.

use crate::error::MetadataResult;
use async_trait::async_trait;
use cairn_core::{ChunkId, ChunkMetadata};

/// Per-chunk metadata keyed by content hash.
#[async_trait]
pub trait ChunkMetadataRepo: Send + Sync {
    /// Record metadata for a chunk. Idempotent: a second set for the same
    /// chunk id leaves the first record in place.
    async fn set_chunk_metadata(
        &self,
        chunk_id: &ChunkId,
        metadata: &ChunkMetadata,
    ) -> MetadataResult<()>;

    /// Fetch metadata for a chunk, if recorded.
    async fn get_chunk_metadata(&self, chunk_id: &ChunkId)
        -> MetadataResult<Option<ChunkMetadata>>;

    /// Remove a chunk's metadata record. Idempotent.
    async fn delete_chunk_metadata(&self, chunk_id: &ChunkId) -> MetadataResult<()>;
}
