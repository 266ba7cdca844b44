//! File-set layer error types.

use thiserror::Error;

/// File-set operation errors.
#[derive(Debug, Error)]
pub enum FilesetError {
    #[error(transparent)]
    Chunk(#[from] cairn_chunk::ChunkError),

    #[error(transparent)]
    Metadata(#[from] cairn_metadata::MetadataError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The index writer requires strictly increasing paths.
    #[error("path out of order: {path:?} does not sort after {last:?}")]
    PathOutOfOrder { path: String, last: String },

    #[error("malformed index chunk: {0}")]
    MalformedIndex(String),

    #[error("iteration aborted: {0}")]
    Aborted(String),
}

/// Result type for file-set operations.
pub type FilesetResult<T> = std::result::Result<T, FilesetError>;
