//! File-set storage facade.

use crate::error::FilesetResult;
use crate::index::{IndexReader, IndexWriter};
use crate::store::FileSetStore;
use cairn_chunk::ChunkStorage;
use cairn_core::StorageConfig;
use cairn_metadata::MetadataStore;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Manages indexed file sets: writers chunk entry streams into trees,
/// readers walk them, and a weighted semaphore caps how many file sets may
/// be open at once.
pub struct FileSetStorage {
    chunks: Arc<ChunkStorage>,
    store: FileSetStore,
    average_bits: u32,
    open_permits: Arc<Semaphore>,
}

impl FileSetStorage {
    pub fn new(
        chunks: Arc<ChunkStorage>,
        metadata: Arc<dyn MetadataStore>,
        config: &StorageConfig,
    ) -> Self {
        Self {
            chunks,
            store: FileSetStore::new(metadata),
            average_bits: config.average_bits,
            open_permits: Arc::new(Semaphore::new(config.max_open_filesets)),
        }
    }

    /// The underlying root store.
    pub fn store(&self) -> &FileSetStore {
        &self.store
    }

    /// A writer whose index chunks are pinned under a fresh chunk set
    /// until the writer's client is closed. The pinning renewer makes the
    /// set name unique, so concurrent writers never share a prefix.
    pub fn new_writer(&self, name: &str) -> IndexWriter {
        let client = Arc::new(self.chunks.new_client(Some(name)));
        IndexWriter::new(client, self.average_bits)
    }

    /// Open a reader over the root stored at `path`, holding one of the
    /// bounded open-file-set permits until the reader is dropped.
    pub async fn open(&self, path: &str) -> FilesetResult<OpenFileSet> {
        let permit = self
            .open_permits
            .clone()
            .acquire_owned()
            .await
            .expect("open-fileset semaphore closed");
        let root = self.store.get_index(path).await?;
        let client = Arc::new(self.chunks.new_client(None));
        Ok(OpenFileSet {
            reader: Some(IndexReader::new(client, root)),
            _permit: permit,
        })
    }
}

/// An opened file set: a one-shot reader plus the open-cap permit that is
/// released when this is dropped.
pub struct OpenFileSet {
    reader: Option<IndexReader>,
    _permit: OwnedSemaphorePermit,
}

impl OpenFileSet {
    /// Take the reader. The traversal is one-shot; reopen for another
    /// iteration.
    pub fn reader(&mut self) -> Option<IndexReader> {
        self.reader.take()
    }
}
