//! Pinning renewer: keeps target objects alive through intermediary
//! tracker objects that can all be renewed with one prefix update.

use crate::renew::{Lifetime, Renewer};
use cairn_metadata::{MetadataResult, Tracker};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Holds a unique id of the form `tmp-<name>-<uuid>`. Every [`add`] creates
/// a fresh tracker object `{id}/{n}` whose sole outbound reference is the
/// target, so the target cannot expire while the pin lives. The background
/// task extends all pins at once with a single `set_ttl_prefix` call.
///
/// [`add`]: ObjectRenewer::add
pub struct ObjectRenewer {
    id: String,
    tracker: Arc<dyn Tracker>,
    ttl: Duration,
    renewer: Renewer,
    next: AtomicU64,
}

impl ObjectRenewer {
    pub fn new(tracker: Arc<dyn Tracker>, name: &str, ttl: Duration) -> Arc<Self> {
        let id = format!("tmp-{}-{}", name, Uuid::new_v4().simple());
        let prefix = format!("{id}/");
        let renew_tracker = tracker.clone();
        let renewer = Renewer::new(ttl, move |ttl| {
            let tracker = renew_tracker.clone();
            let prefix = prefix.clone();
            async move {
                tracker.set_ttl_prefix(&prefix, ttl).await?;
                Ok(())
            }
        });
        Arc::new(Self {
            id,
            tracker,
            ttl,
            renewer,
            next: AtomicU64::new(0),
        })
    }

    /// This renewer's unique id prefix.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Pin `target`: create an object whose sole purpose is to reference
    /// it, with a structured name that renews in bulk by prefix.
    pub async fn add(&self, target: &str) -> MetadataResult<()> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        let pin_id = format!("{}/{}", self.id, n);
        self.tracker
            .create_object(&pin_id, &[target.to_string()], Some(self.ttl))
            .await
    }

    pub fn lifetime(&self) -> Lifetime {
        self.renewer.lifetime()
    }

    /// Stop renewing. Existing pins keep their last TTL and lapse on their
    /// own, after which the garbage collector may reclaim the targets.
    pub async fn close(&self) -> MetadataResult<()> {
        self.renewer.close().await
    }
}
