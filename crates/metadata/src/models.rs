//! Database models mapping to the metadata schema.

use sqlx::FromRow;
use time::OffsetDateTime;

/// A row in `tracker_objects`.
#[derive(Debug, Clone, FromRow)]
pub struct TrackedObjectRow {
    /// Dense surrogate key; only used to keep the refs table compact.
    pub int_id: i64,
    /// Globally unique, prefix-structured identifier.
    pub str_id: String,
    pub tombstone: bool,
    pub created_at: OffsetDateTime,
    /// None means the object never expires (pinned).
    pub expires_at: Option<OffsetDateTime>,
}

/// A row in `chunk_metadata`.
#[derive(Debug, Clone, FromRow)]
pub struct ChunkMetadataRow {
    /// Lowercase hex of the 32-byte content hash.
    pub chunk_hash: String,
    /// JSON array of referenced chunk hashes.
    pub points_to: String,
    pub compression: String,
    /// Uncompressed length.
    pub size_bytes: i64,
    pub created_at: OffsetDateTime,
}

/// A row in `paths`: an opaque serialized index root keyed by path.
#[derive(Debug, Clone, FromRow)]
pub struct PathRow {
    pub path: String,
    pub index_blob: Vec<u8>,
    pub created_at: OffsetDateTime,
}
