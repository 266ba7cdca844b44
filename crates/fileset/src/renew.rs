//! Scoped renewal of file-set paths.

use cairn_metadata::MetadataResult;
use cairn_track::{StringSet, with_string_set};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Run `cb` with a renewer that keeps a mutable set of file-set paths
/// alive for the duration of the callback. The renewer is closed on every
/// exit path; callers scope per-path work to the set's lifetime handle.
pub async fn with_renewer<R, RFut, C, CFut, T>(
    ttl: Duration,
    renew: R,
    cb: C,
) -> MetadataResult<T>
where
    R: Fn(String, Duration) -> RFut + Send + Sync + 'static,
    RFut: Future<Output = MetadataResult<()>> + Send + 'static,
    C: FnOnce(Arc<StringSet>) -> CFut,
    CFut: Future<Output = MetadataResult<T>>,
{
    with_string_set(ttl, renew, cb).await
}
