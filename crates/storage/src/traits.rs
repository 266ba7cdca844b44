//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of object keys for prefix walks.
pub type KeyStream = Pin<Box<dyn Stream<Item = StorageResult<String>> + Send>>;

/// Flat key/bytes store abstraction.
///
/// Listing is eventually consistent; individual keys are strongly
/// consistent. Keys use `/` as a separator but carry no directory
/// semantics beyond prefix matching.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's full content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Get a byte range of an object. `length = 0` means to the end.
    async fn get_range(&self, key: &str, offset: u64, length: u64) -> StorageResult<Bytes>;

    /// Put an object atomically.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Start a streaming upload. Nothing is visible under `key` until
    /// `finish` succeeds.
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>>;

    /// Delete an object. Deleting an absent key is an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Walk all keys with the given string prefix, as a stream.
    /// Key order is backend-defined.
    async fn walk(&self, prefix: &str) -> StorageResult<KeyStream>;

    /// Get the name of this storage backend, for logs.
    fn backend_name(&self) -> &'static str;

    /// Verify backend connectivity.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Trait for streaming uploads.
#[async_trait]
pub trait StreamingUpload: Send {
    /// Write a chunk of data.
    async fn write(&mut self, data: Bytes) -> StorageResult<()>;

    /// Finish the upload, making it visible, and return the bytes written.
    async fn finish(self: Box<Self>) -> StorageResult<u64>;

    /// Abort the upload, discarding anything written.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}
