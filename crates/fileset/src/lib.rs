//! Indexed file sets: an ordered mapping from file paths to chunk
//! references, serialized as a multi-level tree of index chunks that
//! supports prefix and range scans.

pub mod error;
pub mod index;
pub mod renew;
pub mod storage;
pub mod store;

pub use error::{FilesetError, FilesetResult};
pub use index::{FileOp, Index, IndexReader, IndexWriter, PathRange};
pub use renew::with_renewer;
pub use storage::FileSetStorage;
pub use store::FileSetStore;
