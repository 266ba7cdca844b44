//! Object tracker repository trait.
//!
//! The tracker is the source of truth for what exists and what may be
//! deleted. Objects are named by a prefix-structured string id, carry an
//! optional TTL, and hold an immutable set of outbound references. Every
//! state transition is transactional; the insert-edges-then-count idiom in
//! `create_object` is the serialization point that keeps a concurrent
//! garbage collector from tearing references out from under a writer.

use crate::error::MetadataResult;
use crate::models::TrackedObjectRow;
use async_trait::async_trait;
use std::time::Duration;
use time::OffsetDateTime;

/// Transactional reference-graph store.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Create an object with outbound references and an optional TTL.
    ///
    /// `ttl = None` pins the object (it never expires). In one transaction:
    /// the object row is inserted (an existing row is left unmodified and
    /// reported as `ObjectExists`, or `Tombstoned` if it is awaiting
    /// deletion), then one edge per target is inserted by joining against
    /// existing rows. A missing target rolls the whole create back with
    /// `DanglingRef`. `SelfReference` is rejected before touching the
    /// database.
    async fn create_object(
        &self,
        id: &str,
        points_to: &[String],
        ttl: Option<Duration>,
    ) -> MetadataResult<()>;

    /// Extend the TTL of every object whose id starts with `prefix`,
    /// returning the new expiry.
    async fn set_ttl_prefix(&self, prefix: &str, ttl: Duration)
        -> MetadataResult<OffsetDateTime>;

    /// Outbound neighbors of `id`, non-recursive, sorted.
    async fn get_downstream(&self, id: &str) -> MetadataResult<Vec<String>>;

    /// Inbound neighbors of `id`, non-recursive, sorted.
    async fn get_upstream(&self, id: &str) -> MetadataResult<Vec<String>>;

    /// Fetch a single object row, if present.
    async fn get_object(&self, id: &str) -> MetadataResult<Option<TrackedObjectRow>>;

    /// Atomically set `tombstone = true` iff the object has no inbound
    /// references. Absent rows are ignored (idempotent). A still-referenced
    /// object stays live and the call returns `DanglingRef`. The flag never
    /// transitions back to false.
    async fn mark_tombstone(&self, id: &str) -> MetadataResult<()>;

    /// Delete a tombstoned object row and its outbound edges. Absent rows
    /// are ignored (idempotent); deleting a live row fails with
    /// `NotTombstone` and changes nothing.
    async fn finish_delete(&self, id: &str) -> MetadataResult<()>;

    /// Up to `limit` ids that are expired or tombstoned and have no inbound
    /// references. Ordering is unspecified; callers drain batches to empty.
    async fn list_deletable(&self, limit: u32) -> MetadataResult<Vec<String>>;
}
