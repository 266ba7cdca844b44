//! Core domain types and shared logic for cairn.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Chunk identifiers (32-byte content addresses) and hashing
//! - Chunk metadata and data references
//! - Compression algorithm selection
//! - Storage configuration

pub mod chunk;
pub mod config;
pub mod error;
pub mod hash;

pub use chunk::{ChunkMetadata, Compression, DataRef};
pub use config::StorageConfig;
pub use error::{Error, Result};
pub use hash::{ChunkId, ChunkIdHasher};

/// Tracker object id prefix for chunk objects.
pub const CHUNK_OBJECT_PREFIX: &str = "chunk/";

/// Blob store key prefix for chunk bodies.
pub const CHUNK_KEY_PREFIX: &str = "chunks/";

/// Maximum length of a tracker object id in bytes.
pub const MAX_OBJECT_ID_LEN: usize = 4096;
