//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
///
/// The first six variants are sentinels that callers match on: the chunk
/// client treats `ObjectExists` as success, the garbage collector skips on
/// `DanglingRef`, and `Tombstoned` tells a writer to retry its create.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Idempotent create collision: the object already exists, unmodified.
    #[error("object already exists: {0}")]
    ObjectExists(String),

    /// An object may not reference itself.
    #[error("object references itself: {0}")]
    SelfReference(String),

    /// A create referenced a missing object, or a tombstone was requested
    /// for an object that is still referenced.
    #[error("would create dangling reference: {0}")]
    DanglingRef(String),

    /// FinishDelete was called on an object that was never tombstoned.
    #[error("object is not tombstoned: {0}")]
    NotTombstone(String),

    /// The create collided with a tombstoned row awaiting deletion;
    /// the caller should retry once the garbage collector finishes.
    #[error("object is tombstoned: {0}")]
    Tombstoned(String),

    /// Path store miss.
    #[error("path does not exist: {0}")]
    PathNotExists(String),

    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
