//! Multi-level index tree writer.

use super::{ChildRange, Index, encode_entry};
use crate::error::{FilesetError, FilesetResult};
use cairn_chunk::Client;
use cairn_core::DataRef;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

/// Random byte table for the gear rolling hash, generated from a fixed
/// splitmix64 seed so split points are stable across processes.
static GEAR: LazyLock<[u64; 256]> = LazyLock::new(|| {
    let mut table = [0u64; 256];
    let mut state = 0x5bd1_e995_9d3a_7f4du64;
    for slot in table.iter_mut() {
        state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        *slot = z ^ (z >> 31);
    }
    table
});

/// Rolling gear hash over the serialized entry stream.
struct GearHash {
    hash: u64,
}

impl GearHash {
    fn new() -> Self {
        Self { hash: 0 }
    }

    fn roll(&mut self, byte: u8) -> u64 {
        self.hash = (self.hash << 1).wrapping_add(GEAR[byte as usize]);
        self.hash
    }
}

/// One level of the tree under construction.
struct Level {
    buf: Vec<u8>,
    entries: Vec<Index>,
    hash: GearHash,
    boundary: bool,
}

impl Level {
    fn new() -> Self {
        Self {
            buf: Vec::new(),
            entries: Vec::new(),
            hash: GearHash::new(),
            boundary: false,
        }
    }
}

/// Serializes an ordered stream of index entries into a tree of chunks.
///
/// Entries must arrive in strictly increasing path order. Level streams
/// split at content-defined points keyed on `average_bits` low bits of a
/// rolling hash, so identical entry runs chunk identically regardless of
/// what surrounds them.
pub struct IndexWriter {
    client: Arc<Client>,
    mask: u64,
    levels: Vec<Level>,
    last_path: Option<String>,
}

impl IndexWriter {
    pub fn new(client: Arc<Client>, average_bits: u32) -> Self {
        Self {
            client,
            mask: (1u64 << average_bits.clamp(1, 30)) - 1,
            levels: vec![Level::new()],
            last_path: None,
        }
    }

    /// Append the next entry. Paths must be strictly increasing.
    pub async fn write_index(&mut self, entry: Index) -> FilesetResult<()> {
        if let Some(last) = &self.last_path {
            if entry.path.as_str() <= last.as_str() {
                return Err(FilesetError::PathOutOfOrder {
                    path: entry.path.clone(),
                    last: last.clone(),
                });
            }
        }
        self.last_path = Some(entry.path.clone());
        self.append(0, entry).await
    }

    /// Append `entry` at `level`, cascading splits upward.
    async fn append(&mut self, start_level: usize, entry: Index) -> FilesetResult<()> {
        let mut level = start_level;
        let mut entry = entry;
        loop {
            if self.levels.len() == level {
                self.levels.push(Level::new());
            }
            let frame = encode_entry(&entry)?;
            let mask = self.mask;
            let state = &mut self.levels[level];
            for &byte in &frame {
                if state.hash.roll(byte) & mask == 0 {
                    state.boundary = true;
                }
            }
            state.buf.extend_from_slice(&frame);
            state.entries.push(entry);

            // A split needs both a content-defined boundary and at least
            // two entries, so each level stays strictly smaller than the
            // one below it and the tree terminates.
            if state.boundary && state.entries.len() >= 2 {
                let parent = self.emit(level).await?;
                level += 1;
                entry = parent;
                continue;
            }
            return Ok(());
        }
    }

    /// Upload the level's buffered stream as a chunk and produce the
    /// parent entry describing it.
    async fn emit(&mut self, level: usize) -> FilesetResult<Index> {
        let state = &mut self.levels[level];
        let buf = std::mem::take(&mut state.buf);
        let entries = std::mem::take(&mut state.entries);
        state.hash = GearHash::new();
        state.boundary = false;

        // An index chunk points to every chunk its entries reference, both
        // leaf data refs and child index chunks.
        let mut points_to = BTreeSet::new();
        for entry in &entries {
            for data_ref in &entry.data_refs {
                points_to.insert(data_ref.chunk_id);
            }
            if let Some(range) = &entry.range {
                points_to.insert(range.chunk.chunk_id);
            }
        }
        let points_to: Vec<_> = points_to.into_iter().collect();

        let size = buf.len() as u64;
        let chunk_id = self.client.create(&points_to, buf.into()).await?;
        tracing::debug!(level, entries = entries.len(), size, chunk = %chunk_id, "index chunk emitted");

        let lower = entries.first().expect("emit of empty level").path.clone();
        let upper = match &entries.last().expect("emit of empty level").range {
            // An interior child covers through its own upper bound.
            Some(range) => range.upper.clone(),
            None => entries.last().unwrap().path.clone(),
        };
        Ok(Index {
            path: lower.clone(),
            file_op: None,
            data_refs: Vec::new(),
            range: Some(ChildRange {
                lower,
                upper,
                chunk: DataRef::whole(chunk_id, size),
            }),
        })
    }

    /// Flush every level upward and return the root entry.
    ///
    /// An empty writer yields a root with no children; a single-entry
    /// writer yields the leaf itself as the root.
    pub async fn close(mut self) -> FilesetResult<Index> {
        let mut level = 0;
        loop {
            let top = self.levels.len() - 1;
            let pending = self.levels[level].entries.len();
            if level == top {
                return match pending {
                    0 => Ok(Index::default()),
                    1 => Ok(self.levels[level].entries.pop().expect("checked len")),
                    _ => {
                        let parent = self.emit(level).await?;
                        self.append(level + 1, parent).await?;
                        level += 1;
                        continue;
                    }
                };
            }
            if pending > 0 {
                let parent = self.emit(level).await?;
                self.append(level + 1, parent).await?;
            }
            level += 1;
        }
    }
}
