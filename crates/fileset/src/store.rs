//! File-set store: serialized index roots keyed by path.

use crate::error::FilesetResult;
use crate::index::Index;
use cairn_metadata::{MetadataStore, PathRepo};
use std::sync::Arc;

/// Stores index tree roots under logical file-set paths, on top of the
/// metadata layer's path repo.
#[derive(Clone)]
pub struct FileSetStore {
    metadata: Arc<dyn MetadataStore>,
}

impl FileSetStore {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Store `index` as the root for `path`, replacing any previous root.
    /// `None` stores an empty root.
    pub async fn put_index(&self, path: &str, index: Option<&Index>) -> FilesetResult<()> {
        let empty = Index::default();
        let index = index.unwrap_or(&empty);
        let blob = serde_json::to_vec(index)?;
        self.metadata.put_index(path, &blob).await?;
        Ok(())
    }

    /// Fetch the root stored under `path`; a miss surfaces as
    /// [`cairn_metadata::MetadataError::PathNotExists`].
    pub async fn get_index(&self, path: &str) -> FilesetResult<Index> {
        let blob = self.metadata.get_index(path).await?;
        Ok(serde_json::from_slice(&blob)?)
    }

    /// All stored file-set paths with the given prefix, sorted.
    pub async fn walk(&self, prefix: &str) -> FilesetResult<Vec<String>> {
        Ok(self.metadata.walk_paths(prefix).await?)
    }

    /// Remove the root stored under `path`. Idempotent.
    pub async fn delete(&self, path: &str) -> FilesetResult<()> {
        self.metadata.delete_path(path).await?;
        Ok(())
    }
}
