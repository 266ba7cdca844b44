//! Generic background TTL renewer.

use cairn_metadata::{MetadataError, MetadataResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// A handle tied to a renewer's lifetime. Callers scope work to it so that
/// whatever the renewal was protecting stops being used once renewal stops.
#[derive(Clone)]
pub struct Lifetime {
    rx: watch::Receiver<bool>,
}

impl Lifetime {
    /// Resolve once the owning renewer has stopped, for any reason.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Whether the owning renewer has already stopped.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Calls a renew function immediately and then every `ttl / 3`, each call
/// bounded by a `ttl / 3` timeout. The first failure terminates the task;
/// `close` surfaces it. A close-triggered stop is not an error.
pub struct Renewer {
    ttl: Duration,
    shutdown: watch::Sender<bool>,
    lifetime_rx: watch::Receiver<bool>,
    handle: Mutex<Option<JoinHandle<MetadataResult<()>>>>,
}

impl Renewer {
    pub fn new<F, Fut>(ttl: Duration, renew: F) -> Self
    where
        F: Fn(Duration) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MetadataResult<()>> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let lifetime_rx = shutdown_tx.subscribe();

        let done_tx = shutdown_tx.clone();
        let handle = tokio::spawn(async move {
            let result = renew_loop(ttl, renew, shutdown_rx).await;
            // Wake lifetime observers even when the loop dies on its own.
            let _ = done_tx.send(true);
            if let Err(ref e) = result {
                tracing::error!(error = %e, "renewer terminated");
            }
            result
        });

        Self {
            ttl,
            shutdown: shutdown_tx,
            lifetime_rx,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// The TTL this renewer extends on every tick.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A handle tied to this renewer's lifetime.
    pub fn lifetime(&self) -> Lifetime {
        Lifetime {
            rx: self.lifetime_rx.clone(),
        }
    }

    /// Stop the background task and return its terminal error, if any.
    /// Idempotent; calls after the first return Ok.
    pub async fn close(&self) -> MetadataResult<()> {
        let _ = self.shutdown.send(true);
        let handle = self.handle.lock().await.take();
        match handle {
            None => Ok(()),
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(MetadataError::Internal(format!("renew task failed: {e}"))),
            },
        }
    }
}

async fn renew_loop<F, Fut>(
    ttl: Duration,
    renew: F,
    mut shutdown: watch::Receiver<bool>,
) -> MetadataResult<()>
where
    F: Fn(Duration) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MetadataResult<()>> + Send + 'static,
{
    // ttl / 3 leaves two more chances to renew after a failed tick before
    // the TTL actually lapses.
    let tick = ttl / 3;
    let mut interval = tokio::time::interval(tick.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match tokio::time::timeout(tick, renew(ttl)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => return Err(e),
                    Err(_) => {
                        return Err(MetadataError::Internal(format!(
                            "renew call exceeded {tick:?}"
                        )));
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(());
                }
            }
        }
    }
}
