//! Chunk client: consistency between tracker, metadata store, and blob
//! store.

use crate::compress;
use crate::error::{ChunkError, ChunkResult};
use crate::storage::CreateOptions;
use async_trait::async_trait;
use bytes::Bytes;
use cairn_core::{CHUNK_OBJECT_PREFIX, ChunkId, ChunkMetadata};
use cairn_metadata::{ChunkMetadataRepo, MetadataError, MetadataStore, Tracker};
use cairn_storage::{ObjectStore, StorageError};
use cairn_track::{BoxError, Deleter, ObjectRenewer};
use std::sync::Arc;
use std::time::Duration;

/// Allows manipulation of individual chunks while keeping the tracker, the
/// chunk metadata store, and the blob store consistent.
///
/// Writers hold a pinning renewer; readers are constructed without one.
pub struct Client {
    store: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    renewer: Option<Arc<ObjectRenewer>>,
    opts: CreateOptions,
    ttl: Duration,
}

impl Client {
    pub(crate) fn new(
        store: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        renewer: Option<Arc<ObjectRenewer>>,
        opts: CreateOptions,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            metadata,
            renewer,
            opts,
            ttl,
        }
    }

    /// Store a chunk and return its content address.
    ///
    /// The order of operations is the consistency protocol: the tracker
    /// object is created first (an existing one counts as success), the
    /// chunk is pinned under the caller's renewal prefix so it cannot
    /// expire mid-upload, and only then are metadata and bytes written.
    /// The blob write itself is safe to race; content addressing makes
    /// last-writer-wins harmless.
    ///
    /// A create that lands on a tombstoned tracker row surfaces
    /// [`MetadataError::Tombstoned`]; the caller should retry after the
    /// garbage collector finishes with the old row.
    pub async fn create(&self, points_to: &[ChunkId], data: Bytes) -> ChunkResult<ChunkId> {
        let chunk_id = ChunkId::compute(&data);
        let chunk_oid = chunk_id.to_object_id();
        let points_to_oids: Vec<String> = points_to.iter().map(ChunkId::to_object_id).collect();

        match self
            .metadata
            .create_object(&chunk_oid, &points_to_oids, Some(self.ttl))
            .await
        {
            Ok(()) => {}
            Err(MetadataError::ObjectExists(_)) => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(renewer) = &self.renewer {
            renewer.add(&chunk_oid).await?;
        }
        // From here on nothing will delete the chunk: either its own TTL or
        // the pin keeps it live.

        let blob_key = chunk_id.to_blob_key();
        if self.store.exists(&blob_key).await? {
            // Another writer already uploaded identical content.
            return Ok(chunk_id);
        }

        let metadata = ChunkMetadata {
            points_to: points_to.to_vec(),
            compression: self.opts.compression,
            size_bytes: data.len() as u64,
        };
        self.metadata
            .set_chunk_metadata(&chunk_id, &metadata)
            .await?;

        let body = compress::compress(self.opts.compression, &data).await?;
        self.store.put(&blob_key, body).await?;
        tracing::debug!(chunk = %chunk_id, size = data.len(), "chunk uploaded");
        Ok(chunk_id)
    }

    /// Read a chunk's uncompressed bytes.
    pub async fn get(&self, chunk_id: &ChunkId) -> ChunkResult<Bytes> {
        let body = self.store.get(&chunk_id.to_blob_key()).await?;
        let metadata = self
            .metadata
            .get_chunk_metadata(chunk_id)
            .await?
            .ok_or(ChunkError::MissingMetadata(*chunk_id))?;
        let data = compress::decompress(metadata.compression, &body).await?;
        Ok(data)
    }

    /// Whether a chunk's bytes are present in the blob store.
    pub async fn exists(&self, chunk_id: &ChunkId) -> ChunkResult<bool> {
        Ok(self.store.exists(&chunk_id.to_blob_key()).await?)
    }

    /// Release the writer's pins. Chunks created through this client then
    /// survive only as long as something else references them or their TTL
    /// lasts.
    pub async fn close(&self) -> ChunkResult<()> {
        if let Some(renewer) = &self.renewer {
            renewer.close().await?;
        }
        Ok(())
    }
}

/// Deletes the blob and metadata backing a `chunk/<hex>` tracker id.
/// Metadata is removed last so it always outlives the blob.
pub struct ChunkDeleter {
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) metadata: Arc<dyn MetadataStore>,
}

#[async_trait]
impl Deleter for ChunkDeleter {
    async fn delete(&self, id: &str) -> Result<(), BoxError> {
        let hex = id
            .strip_prefix(CHUNK_OBJECT_PREFIX)
            .ok_or_else(|| format!("cannot delete ({id}): not a chunk object"))?;
        let chunk_id = ChunkId::from_hex(hex)?;

        match self.store.delete(&chunk_id.to_blob_key()).await {
            Ok(()) => {}
            // A crashed writer may have created the tracker object without
            // ever uploading bytes.
            Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.metadata.delete_chunk_metadata(&chunk_id).await?;
        Ok(())
    }
}
