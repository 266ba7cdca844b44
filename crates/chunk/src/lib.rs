//! Content-addressed chunk storage for cairn.
//!
//! The chunk client maintains consistency between the object tracker, the
//! chunk metadata store, and the blob store: a chunk's bytes exist in the
//! blob store iff a tracker object named `chunk/<hex>` exists, and the
//! creation order guarantees the garbage collector and concurrent writers
//! cannot race each other into dangling state.

pub mod client;
pub mod compress;
pub mod error;
pub mod storage;

pub use client::{ChunkDeleter, Client};
pub use error::{ChunkError, ChunkResult};
pub use storage::{ChunkStorage, CreateOptions};
