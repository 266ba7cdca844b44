//! A renewer over a mutable set of string identifiers.

use crate::renew::{Lifetime, Renewer};
use cairn_metadata::MetadataResult;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Renews each member of a mutable identifier set on every tick, invoking a
/// caller-supplied per-element renew function. The tick holds the set's
/// mutex, so `add` and `remove` cannot interleave with a renewal pass.
pub struct StringSet {
    renewer: Renewer,
    set: Arc<Mutex<BTreeSet<String>>>,
}

impl StringSet {
    pub fn new<F, Fut>(ttl: Duration, renew: F) -> Arc<Self>
    where
        F: Fn(String, Duration) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MetadataResult<()>> + Send + 'static,
    {
        let set: Arc<Mutex<BTreeSet<String>>> = Arc::new(Mutex::new(BTreeSet::new()));
        let tick_set = set.clone();
        let renew = Arc::new(renew);
        let renewer = Renewer::new(ttl, move |ttl| {
            let set = tick_set.clone();
            let renew = renew.clone();
            async move {
                let guard = set.lock().await;
                // Sequential, first error aborts the tick.
                for element in guard.iter() {
                    renew(element.clone(), ttl).await?;
                }
                Ok(())
            }
        });
        Arc::new(Self { renewer, set })
    }

    /// Add `x` to the set of identifiers being renewed.
    pub async fn add(&self, x: impl Into<String>) {
        self.set.lock().await.insert(x.into());
    }

    /// Remove `x` from the set of identifiers being renewed.
    pub async fn remove(&self, x: &str) {
        self.set.lock().await.remove(x);
    }

    /// Current members, for inspection.
    pub async fn contains(&self, x: &str) -> bool {
        self.set.lock().await.contains(x)
    }

    pub fn lifetime(&self) -> Lifetime {
        self.renewer.lifetime()
    }

    pub async fn close(&self) -> MetadataResult<()> {
        self.renewer.close().await
    }
}

/// Run `cb` with a [`StringSet`] scoped to the call: the set is closed on
/// every exit path, and a renewal failure cancels work scoped to the set's
/// lifetime.
pub async fn with_string_set<F, Fut, C, CFut, T>(ttl: Duration, renew: F, cb: C) -> MetadataResult<T>
where
    F: Fn(String, Duration) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MetadataResult<()>> + Send + 'static,
    C: FnOnce(Arc<StringSet>) -> CFut,
    CFut: Future<Output = MetadataResult<T>>,
{
    let set = StringSet::new(ttl, renew);
    let result = cb(set.clone()).await;
    let close_result = set.close().await;
    match result {
        Ok(value) => {
            close_result?;
            Ok(value)
        }
        Err(e) => Err(e),
    }
}
