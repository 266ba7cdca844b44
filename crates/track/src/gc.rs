//! Garbage collection of expired, unreferenced tracker objects.

use async_trait::async_trait;
use cairn_metadata::{MetadataError, MetadataResult, Tracker};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Opaque error type for deleters; the collector only logs these.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Removes the external artifacts backing a tracker id (blob bytes,
/// metadata records) before the tracker row itself is deleted.
#[async_trait]
pub trait Deleter: Send + Sync {
    async fn delete(&self, id: &str) -> Result<(), BoxError>;
}

/// Deleter for objects with no external artifacts, such as pinning
/// objects: only the tracker row itself needs to go.
pub struct NopDeleter;

#[async_trait]
impl Deleter for NopDeleter {
    async fn delete(&self, _id: &str) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Dispatches to a deleter by object-id prefix. Longest registered prefix
/// wins; an id no deleter claims is an error.
#[derive(Default)]
pub struct DeleterMux {
    routes: Vec<(String, Arc<dyn Deleter>)>,
}

impl DeleterMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, prefix: impl Into<String>, deleter: Arc<dyn Deleter>) -> Self {
        self.routes.push((prefix.into(), deleter));
        self.routes
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        self
    }

    fn route(&self, id: &str) -> Option<&Arc<dyn Deleter>> {
        self.routes
            .iter()
            .find(|(prefix, _)| id.starts_with(prefix.as_str()))
            .map(|(_, deleter)| deleter)
    }
}

#[async_trait]
impl Deleter for DeleterMux {
    async fn delete(&self, id: &str) -> Result<(), BoxError> {
        match self.route(id) {
            Some(deleter) => deleter.delete(id).await,
            None => Err(format!("no deleter registered for ({id})").into()),
        }
    }
}

/// How many deletable ids to pull from the tracker per batch.
const DELETE_BATCH: u32 = 1000;

/// Finds expired, unreferenced objects, tombstones them, runs the
/// type-specific deleter, and removes the tracker record. Per-object
/// failures are logged and retried on the next sweep, never fatal.
pub struct GarbageCollector {
    tracker: Arc<dyn Tracker>,
    period: Duration,
    deleter: Arc<dyn Deleter>,
}

impl GarbageCollector {
    pub fn new(tracker: Arc<dyn Tracker>, period: Duration, deleter: Arc<dyn Deleter>) -> Self {
        Self {
            tracker,
            period,
            deleter,
        }
    }

    /// Sweep every `period` until `shutdown` flips. Each sweep is bounded
    /// by `period / 2` so the next tick is never starved.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match tokio::time::timeout(self.period / 2, self.run_until_empty()).await {
                        Ok(Ok(deleted)) if deleted > 0 => {
                            tracing::info!(deleted, "gc sweep finished");
                        }
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => {
                            tracing::error!(error = %e, "gc sweep failed");
                        }
                        Err(_) => {
                            tracing::warn!(period = ?self.period, "gc sweep timed out");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }

    /// Drain deletable objects until a pass deletes nothing.
    pub async fn run_until_empty(&self) -> MetadataResult<usize> {
        let mut total = 0;
        loop {
            let n = self.run_once().await?;
            total += n;
            if n == 0 {
                return Ok(total);
            }
        }
    }

    /// One pass over currently deletable objects. Returns how many were
    /// fully deleted.
    pub async fn run_once(&self) -> MetadataResult<usize> {
        let ids = self.tracker.list_deletable(DELETE_BATCH).await?;
        let mut deleted = 0;
        for id in &ids {
            match self.delete_object(id).await {
                Ok(true) => deleted += 1,
                Ok(false) => {
                    tracing::debug!(id, "object re-referenced, skipping");
                }
                Err(e) => {
                    tracing::error!(id, error = %e, "error deleting object");
                }
            }
        }
        Ok(deleted)
    }

    /// Tombstone, delete backing artifacts, then drop the tracker row.
    /// Returns false when a concurrent reference vetoed the tombstone.
    async fn delete_object(&self, id: &str) -> Result<bool, BoxError> {
        match self.tracker.mark_tombstone(id).await {
            Ok(()) => {}
            Err(MetadataError::DanglingRef(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        self.deleter.delete(id).await?;
        self.tracker.finish_delete(id).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mux_prefers_longest_prefix() {
        let mux = DeleterMux::new()
            .register("chunk/", Arc::new(NopDeleter))
            .register("chunk/special-", Arc::new(NopDeleter));
        assert!(mux.route("chunk/abc").is_some());
        assert!(mux.route("chunk/special-abc").is_some());
        assert!(mux.route("other/abc").is_none());
    }

    #[tokio::test]
    async fn mux_rejects_unrouted_ids() {
        let mux = DeleterMux::new().register("chunk/", Arc::new(NopDeleter));
        let err = mux.delete("tmp-foo-bar/0").await.unwrap_err();
        assert!(err.to_string().contains("no deleter"));
    }
}
