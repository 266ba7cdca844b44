//! Index entry model and the tree writer/reader.
//!
//! An index is an ordered sequence of per-path entries serialized into
//! chunks. When a level's serialized stream grows past a content-defined
//! split point, the level emits a chunk and records its path range as a
//! single entry one level up; the root is the entry whose range covers
//! every path.

pub mod reader;
pub mod writer;

pub use reader::IndexReader;
pub use writer::IndexWriter;

use crate::error::{FilesetError, FilesetResult};
use cairn_core::DataRef;
use serde::{Deserialize, Serialize};

/// What happened at a path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum FileOp {
    /// The path holds file content, with optional tags.
    Put {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tags: Vec<String>,
    },
    /// The path was deleted.
    Delete,
}

impl FileOp {
    pub fn put() -> Self {
        Self::Put { tags: Vec::new() }
    }
}

/// A child pointer: the `[lower, upper]` path range covered by an index
/// chunk, and the reference to that chunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRange {
    pub lower: String,
    pub upper: String,
    pub chunk: DataRef,
}

/// An inclusive path interval for filtered iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathRange {
    pub lower: String,
    pub upper: String,
}

/// One index entry: either a leaf describing a file operation at a path,
/// or an interior node pointing at a child index chunk.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Index {
    /// The logical file path; for interior nodes, the lower bound of the
    /// covered range.
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_op: Option<FileOp>,
    /// Ordered data references for leaf entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_refs: Vec<DataRef>,
    /// Present on interior nodes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ChildRange>,
}

impl Index {
    /// A leaf entry.
    pub fn leaf(path: impl Into<String>, file_op: FileOp, data_refs: Vec<DataRef>) -> Self {
        Self {
            path: path.into(),
            file_op: Some(file_op),
            data_refs,
            range: None,
        }
    }

    /// Whether this is the root of an index with no entries at all.
    pub fn is_empty_root(&self) -> bool {
        self.file_op.is_none() && self.data_refs.is_empty() && self.range.is_none()
    }
}

/// Serialize an entry as a length-framed JSON record.
pub(crate) fn encode_entry(entry: &Index) -> FilesetResult<Vec<u8>> {
    let body = serde_json::to_vec(entry)?;
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Parse a chunk body back into its entries.
pub(crate) fn decode_entries(mut data: &[u8]) -> FilesetResult<Vec<Index>> {
    let mut entries = Vec::new();
    while !data.is_empty() {
        if data.len() < 4 {
            return Err(FilesetError::MalformedIndex(
                "truncated frame header".to_string(),
            ));
        }
        let len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        data = &data[4..];
        if data.len() < len {
            return Err(FilesetError::MalformedIndex(format!(
                "frame length {len} exceeds remaining {}",
                data.len()
            )));
        }
        entries.push(serde_json::from_slice(&data[..len])?);
        data = &data[len..];
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::ChunkId;

    #[test]
    fn frame_roundtrip() {
        let entries = vec![
            Index::leaf("a", FileOp::put(), vec![]),
            Index::leaf(
                "b",
                FileOp::Delete,
                vec![DataRef::whole(ChunkId::compute(b"x"), 9)],
            ),
        ];
        let mut buf = Vec::new();
        for entry in &entries {
            buf.extend_from_slice(&encode_entry(entry).unwrap());
        }
        let decoded = decode_entries(&buf).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let frame = encode_entry(&Index::leaf("a", FileOp::put(), vec![])).unwrap();
        assert!(decode_entries(&frame[..frame.len() - 1]).is_err());
        assert!(decode_entries(&frame[..2]).is_err());
    }

    #[test]
    fn empty_root_detection() {
        assert!(Index::default().is_empty_root());
        assert!(!Index::leaf("a", FileOp::put(), vec![]).is_empty_root());
    }
}
