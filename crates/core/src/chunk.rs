//! Chunk metadata and data reference types.

use crate::hash::ChunkId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Compression applied to a chunk body before upload.
///
/// The uncompressed bytes are what the content address is computed over, so
/// the algorithm can vary per chunk without affecting identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Store bytes as-is.
    None,
    /// Zstandard, default level.
    #[default]
    Zstd,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Zstd => "zstd",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "zstd" => Some(Self::Zstd),
            _ => None,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata recorded for every stored chunk, keyed by its content address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Chunk ids this chunk's bytes reference. Index chunks point to the
    /// chunks their entries reference; data chunks point to nothing.
    #[serde(default)]
    pub points_to: Vec<ChunkId>,
    /// Compression applied to the stored body.
    #[serde(default)]
    pub compression: Compression,
    /// Uncompressed length in bytes.
    #[serde(default)]
    pub size_bytes: u64,
}

/// A reference to a byte range within a chunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRef {
    /// The chunk being referenced.
    pub chunk_id: ChunkId,
    /// Offset of the range within the uncompressed chunk.
    pub offset: u64,
    /// Length of the range.
    pub length: u64,
}

impl DataRef {
    /// A reference covering an entire chunk of `length` bytes.
    pub fn whole(chunk_id: ChunkId, length: u64) -> Self {
        Self {
            chunk_id,
            offset: 0,
            length,
        }
    }
}
