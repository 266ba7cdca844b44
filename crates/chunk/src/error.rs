//! Chunk layer error types.

use cairn_core::ChunkId;
use thiserror::Error;

/// Chunk operation errors.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error(transparent)]
    Metadata(#[from] cairn_metadata::MetadataError),

    #[error(transparent)]
    Storage(#[from] cairn_storage::StorageError),

    #[error(transparent)]
    Core(#[from] cairn_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blob exists but no metadata record does; the writer protocol
    /// makes this unreachable except through external tampering.
    #[error("chunk has no metadata record: {0}")]
    MissingMetadata(ChunkId),
}

/// Result type for chunk operations.
pub type ChunkResult<T> = std::result::Result<T, ChunkError>;
