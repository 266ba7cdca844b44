//! Configuration types shared across crates.

use crate::chunk::Compression;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Storage layer configuration.
///
/// All fields are optional in serialized form and fall back to defaults
/// sized for a mid-size deployment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bytes buffered in memory before a file-set part is flushed.
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold: u64,
    /// Bytes at which compaction shards split.
    #[serde(default = "default_shard_threshold")]
    pub shard_threshold: u64,
    /// Target size of a level-zero file set in the compaction hierarchy.
    #[serde(default = "default_level_zero_size")]
    pub level_zero_size: u64,
    /// Exponential growth base for level sizes above zero.
    #[serde(default = "default_level_size_base")]
    pub level_size_base: u64,
    /// Concurrency cap on open file-set readers.
    #[serde(default = "default_max_open_filesets")]
    pub max_open_filesets: usize,
    /// Default compression for newly created chunks.
    #[serde(default)]
    pub compression: Compression,
    /// Bits of the rolling hash consulted for index chunk split points.
    /// The expected chunk size is roughly `2^average_bits` bytes.
    #[serde(default = "default_average_bits")]
    pub average_bits: u32,
    /// TTL granted to chunk tracker objects at creation, in seconds.
    #[serde(default = "default_chunk_ttl_secs")]
    pub chunk_ttl_secs: u64,
    /// Garbage collector sweep period, in seconds.
    #[serde(default = "default_gc_period_secs")]
    pub gc_period_secs: u64,
}

impl StorageConfig {
    /// TTL granted to chunk tracker objects at creation.
    pub fn chunk_ttl(&self) -> Duration {
        Duration::from_secs(self.chunk_ttl_secs)
    }

    /// Garbage collector sweep period.
    pub fn gc_period(&self) -> Duration {
        Duration::from_secs(self.gc_period_secs)
    }

    /// Validate config values that would break runtime components.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.average_bits == 0 || self.average_bits > 30 {
            return Err(format!(
                "average_bits must be in 1..=30, got {}",
                self.average_bits
            ));
        }
        if self.max_open_filesets == 0 {
            return Err("max_open_filesets must be at least 1".to_string());
        }
        if self.chunk_ttl_secs == 0 {
            return Err("chunk_ttl_secs must be nonzero".to_string());
        }
        if self.gc_period_secs == 0 {
            return Err("gc_period_secs must be nonzero".to_string());
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            memory_threshold: default_memory_threshold(),
            shard_threshold: default_shard_threshold(),
            level_zero_size: default_level_zero_size(),
            level_size_base: default_level_size_base(),
            max_open_filesets: default_max_open_filesets(),
            compression: Compression::default(),
            average_bits: default_average_bits(),
            chunk_ttl_secs: default_chunk_ttl_secs(),
            gc_period_secs: default_gc_period_secs(),
        }
    }
}

fn default_memory_threshold() -> u64 {
    64 * 1024 * 1024
}

fn default_shard_threshold() -> u64 {
    1024 * 1024 * 1024
}

fn default_level_zero_size() -> u64 {
    1024 * 1024
}

fn default_level_size_base() -> u64 {
    10
}

fn default_max_open_filesets() -> usize {
    100
}

fn default_average_bits() -> u32 {
    20
}

fn default_chunk_ttl_secs() -> u64 {
    30 * 60
}

fn default_gc_period_secs() -> u64 {
    60
}
