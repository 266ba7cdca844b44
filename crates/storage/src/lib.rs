//! Blob store abstraction and backends for cairn.
//!
//! This crate provides:
//! - The `ObjectStore` trait: a flat key/bytes store with streaming puts
//!   and prefix walks, strongly consistent per key
//! - A local filesystem backend with atomic writes

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemStore;
pub use error::{StorageError, StorageResult};
pub use traits::{KeyStream, ObjectStore, StreamingUpload};
