//! Chunk storage facade.

use crate::client::{ChunkDeleter, Client};
use crate::error::ChunkResult;
use cairn_core::{CHUNK_KEY_PREFIX, ChunkId, Compression, StorageConfig};
use cairn_metadata::MetadataStore;
use cairn_storage::ObjectStore;
use cairn_track::{Deleter, ObjectRenewer};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// Options applied to every chunk created through a client.
#[derive(Clone, Copy, Debug)]
pub struct CreateOptions {
    pub compression: Compression,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            compression: Compression::Zstd,
        }
    }
}

/// Manages chunk storage: hands out clients, walks stored chunks, and
/// builds the deleter the garbage collector dispatches to.
pub struct ChunkStorage {
    store: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    create_opts: CreateOptions,
    ttl: Duration,
}

impl ChunkStorage {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        config: &StorageConfig,
    ) -> Self {
        Self {
            store,
            metadata,
            create_opts: CreateOptions {
                compression: config.compression,
            },
            ttl: config.chunk_ttl(),
        }
    }

    /// A writer client whose chunks are pinned under `chunk_set` until the
    /// client is closed. Pass `None` for a read-only client with no pins.
    pub fn new_client(&self, chunk_set: Option<&str>) -> Client {
        let renewer = chunk_set.map(|name| {
            let tracker: Arc<dyn cairn_metadata::Tracker> = self.metadata.clone();
            ObjectRenewer::new(tracker, name, self.ttl)
        });
        Client::new(
            self.store.clone(),
            self.metadata.clone(),
            renewer,
            self.create_opts,
            self.ttl,
        )
    }

    /// All chunk ids currently present in the blob store.
    pub async fn list(&self) -> ChunkResult<Vec<ChunkId>> {
        let mut stream = self.store.walk(CHUNK_KEY_PREFIX).await?;
        let mut ids = Vec::new();
        while let Some(key) = stream.next().await {
            let key = key?;
            if let Some(hex) = key.strip_prefix(CHUNK_KEY_PREFIX) {
                if let Ok(id) = ChunkId::from_hex(hex) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    /// The deleter for `chunk/` tracker ids, for registration in a
    /// [`cairn_track::DeleterMux`].
    pub fn deleter(&self) -> Arc<dyn Deleter> {
        Arc::new(ChunkDeleter {
            store: self.store.clone(),
            metadata: self.metadata.clone(),
        })
    }
}
