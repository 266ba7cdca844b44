//! Metadata store abstraction and implementations for cairn.
//!
//! This crate provides the control-plane data model:
//! - The object tracker: a reference graph of named, TTL-bearing objects
//!   with tombstones and a safe-deletion protocol
//! - Chunk-level metadata keyed by content hash
//! - Serialized index roots keyed by path
//!
//! Every repo is a trait implemented by both a SQLite store (testing,
//! single-node) and a PostgreSQL store (production).

pub mod error;
pub mod models;
pub mod postgres;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use postgres::PostgresStore;
pub use repos::{ChunkMetadataRepo, PathRepo, Tracker};
pub use store::{MetadataStore, SqliteStore};
