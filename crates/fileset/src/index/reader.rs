//! Filtered index tree reader.

use super::{Index, PathRange, decode_entries};
use crate::error::FilesetResult;
use cairn_chunk::Client;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Clone, Debug)]
enum Filter {
    Prefix(String),
    Range(PathRange),
}

impl Filter {
    /// Whether a leaf path passes the filter.
    fn matches(&self, path: &str) -> bool {
        match self {
            Filter::Prefix(p) => path.starts_with(p.as_str()),
            Filter::Range(r) => r.lower.as_str() <= path && path <= r.upper.as_str(),
        }
    }

    /// Whether a child covering `[lower, upper]` can contain a matching
    /// path. False positives only cost a descent; the leaf check is exact.
    fn intersects(&self, lower: &str, upper: &str) -> bool {
        match self {
            Filter::Prefix(p) => {
                // Paths with prefix p sort at or after p itself, and the
                // lower bound must not already sort past every extension.
                upper >= p.as_str() && (lower <= p.as_str() || lower.starts_with(p.as_str()))
            }
            Filter::Range(r) => lower <= r.upper.as_str() && upper >= r.lower.as_str(),
        }
    }
}

/// Walks an index tree in path order, descending only into child ranges
/// the filter intersects. The traversal is lazy and one-shot; open a fresh
/// reader to iterate again.
pub struct IndexReader {
    client: Arc<Client>,
    root: Index,
    filter: Option<Filter>,
}

impl IndexReader {
    pub fn new(client: Arc<Client>, root: Index) -> Self {
        Self {
            client,
            root,
            filter: None,
        }
    }

    /// Deliver only paths starting with `prefix`. Byte-ordered and
    /// case-sensitive, like all path comparisons.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.filter = Some(Filter::Prefix(prefix.into()));
        self
    }

    /// Deliver only paths within the inclusive range.
    pub fn with_range(mut self, range: PathRange) -> Self {
        self.filter = Some(Filter::Range(range));
        self
    }

    /// Invoke `cb` for every matching leaf entry, in ascending path order,
    /// each exactly once. A callback error aborts the walk.
    pub async fn iterate<F>(self, mut cb: F) -> FilesetResult<()>
    where
        F: FnMut(&Index) -> FilesetResult<()>,
    {
        if self.root.is_empty_root() {
            return Ok(());
        }

        // Depth-first with explicit frames keeps entries in path order:
        // children are expanded in place of their parent entry.
        let mut stack: Vec<VecDeque<Index>> = vec![VecDeque::from([self.root.clone()])];
        while let Some(frame) = stack.last_mut() {
            let Some(entry) = frame.pop_front() else {
                stack.pop();
                continue;
            };
            match &entry.range {
                Some(range) => {
                    let descend = match &self.filter {
                        None => true,
                        Some(filter) => filter.intersects(&range.lower, &range.upper),
                    };
                    if descend {
                        let body = self.client.get(&range.chunk.chunk_id).await?;
                        let children = decode_entries(&body)?;
                        stack.push(VecDeque::from(children));
                    }
                }
                None => {
                    let deliver = match &self.filter {
                        None => true,
                        Some(filter) => filter.matches(&entry.path),
                    };
                    if deliver {
                        cb(&entry)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_intersection() {
        let f = Filter::Prefix("b".to_string());
        assert!(f.intersects("a", "c"));
        assert!(f.intersects("ba", "bz"));
        assert!(!f.intersects("c", "d"));
        assert!(!f.intersects("aa", "ab"));
        assert!(f.intersects("a", "b"));
    }

    #[test]
    fn range_intersection() {
        let f = Filter::Range(PathRange {
            lower: "b".to_string(),
            upper: "d".to_string(),
        });
        assert!(f.intersects("a", "b"));
        assert!(f.intersects("c", "z"));
        assert!(!f.intersects("e", "f"));
        assert!(!f.intersects("a", "a"));
    }

    #[test]
    fn leaf_matching() {
        let prefix = Filter::Prefix("ab".to_string());
        assert!(prefix.matches("ab"));
        assert!(prefix.matches("abc"));
        assert!(!prefix.matches("b"));

        let range = Filter::Range(PathRange {
            lower: "b".to_string(),
            upper: "d".to_string(),
        });
        assert!(range.matches("b"));
        assert!(range.matches("cz"));
        assert!(range.matches("d"));
        assert!(!range.matches("dz"));
        assert!(!range.matches("a"));
    }
}
