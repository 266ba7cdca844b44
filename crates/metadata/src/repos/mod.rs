//! Repository traits for metadata operations.

pub mod chunks;
pub mod paths;
pub mod tracker;

pub use chunks::ChunkMetadataRepo;
pub use paths::PathRepo;
pub use tracker::Tracker;
