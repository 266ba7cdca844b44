//! Pinning renewer and garbage collector against a real SQLite tracker.

use async_trait::async_trait;
use cairn_metadata::{SqliteStore, Tracker};
use cairn_track::{BoxError, Deleter, DeleterMux, GarbageCollector, NopDeleter, ObjectRenewer};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

async fn tracker() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::new(":memory:").await.unwrap())
}

struct CountingDeleter {
    deleted: AtomicUsize,
}

#[async_trait]
impl Deleter for CountingDeleter {
    async fn delete(&self, _id: &str) -> Result<(), BoxError> {
        self.deleted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn pins_keep_target_alive_and_renew_in_bulk() {
    let tracker = tracker().await;
    tracker
        .create_object("chunk/target", &[], Some(Duration::from_millis(300)))
        .await
        .unwrap();

    let renewer = ObjectRenewer::new(tracker.clone(), "test", Duration::from_millis(300));
    renewer.add("chunk/target").await.unwrap();
    assert!(renewer.id().starts_with("tmp-test-"));

    let pin_id = format!("{}/0", renewer.id());
    let first_expiry = tracker
        .get_object(&pin_id)
        .await
        .unwrap()
        .unwrap()
        .expires_at
        .unwrap();

    // Two renewal periods later, the pin's TTL has been pushed forward.
    tokio::time::sleep(Duration::from_millis(600)).await;
    let later_expiry = tracker
        .get_object(&pin_id)
        .await
        .unwrap()
        .unwrap()
        .expires_at
        .unwrap();
    assert!(later_expiry > first_expiry, "renewal advanced the expiry");

    // The pin references the target, so even though the target's own TTL
    // lapsed, the GC may not touch it.
    let gc = GarbageCollector::new(
        tracker.clone(),
        Duration::from_millis(100),
        Arc::new(NopDeleter),
    );
    gc.run_until_empty().await.unwrap();
    assert!(tracker.get_object("chunk/target").await.unwrap().is_some());

    renewer.close().await.unwrap();
}

#[tokio::test]
async fn closed_renewer_lets_gc_reclaim_target() {
    let tracker = tracker().await;
    tracker
        .create_object("chunk/target", &[], Some(Duration::from_millis(200)))
        .await
        .unwrap();
    let renewer = ObjectRenewer::new(tracker.clone(), "test", Duration::from_millis(200));
    renewer.add("chunk/target").await.unwrap();
    renewer.close().await.unwrap();

    // Once the pins lapse, first the pin objects become deletable, then
    // the target does; draining repeatedly reclaims the whole graph.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let deleter = Arc::new(CountingDeleter {
        deleted: AtomicUsize::new(0),
    });
    let gc = GarbageCollector::new(tracker.clone(), Duration::from_millis(100), deleter.clone());
    gc.run_until_empty().await.unwrap();

    assert!(tracker.get_object("chunk/target").await.unwrap().is_none());
    assert_eq!(deleter.deleted.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn pin_counter_increments_per_add() {
    let tracker = tracker().await;
    for name in ["chunk/a", "chunk/b"] {
        tracker.create_object(name, &[], None).await.unwrap();
    }
    let renewer = ObjectRenewer::new(tracker.clone(), "set", Duration::from_secs(60));
    renewer.add("chunk/a").await.unwrap();
    renewer.add("chunk/b").await.unwrap();

    let downstream_0 = tracker
        .get_downstream(&format!("{}/0", renewer.id()))
        .await
        .unwrap();
    let downstream_1 = tracker
        .get_downstream(&format!("{}/1", renewer.id()))
        .await
        .unwrap();
    assert_eq!(downstream_0, vec!["chunk/a"]);
    assert_eq!(downstream_1, vec!["chunk/b"]);

    renewer.close().await.unwrap();
}

#[tokio::test]
async fn gc_loop_stops_on_shutdown() {
    let tracker = tracker().await;
    let gc = Arc::new(GarbageCollector::new(
        tracker.clone(),
        Duration::from_millis(20),
        Arc::new(DeleterMux::new().register("chunk/", Arc::new(NopDeleter))),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let gc2 = gc.clone();
    let handle = tokio::spawn(async move { gc2.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(60)).await;
    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("gc loop exits on shutdown")
        .unwrap();
}

#[tokio::test]
async fn gc_continues_past_failing_objects() {
    struct FailingDeleter;

    #[async_trait]
    impl Deleter for FailingDeleter {
        async fn delete(&self, id: &str) -> Result<(), BoxError> {
            if id == "chunk/bad" {
                return Err("backing store unavailable".into());
            }
            Ok(())
        }
    }

    let tracker = tracker().await;
    tracker
        .create_object("chunk/bad", &[], Some(Duration::from_millis(10)))
        .await
        .unwrap();
    tracker
        .create_object("chunk/good", &[], Some(Duration::from_millis(10)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;

    let gc = GarbageCollector::new(
        tracker.clone(),
        Duration::from_millis(100),
        Arc::new(FailingDeleter),
    );
    gc.run_once().await.unwrap();

    // The failing object is retried next tick; the good one is gone.
    assert!(tracker.get_object("chunk/good").await.unwrap().is_none());
    let bad = tracker.get_object("chunk/bad").await.unwrap().unwrap();
    assert!(bad.tombstone, "tombstone survives a failed deleter");
}
