//! Object tracker semantics against the SQLite store.

use cairn_metadata::{MetadataError, SqliteStore, Tracker};
use std::time::Duration;

async fn store() -> SqliteStore {
    SqliteStore::new(":memory:").await.unwrap()
}

fn ids(targets: &[&str]) -> Vec<String> {
    targets.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn create_and_get_object() {
    let store = store().await;
    store.create_object("a", &[], None).await.unwrap();

    let row = store.get_object("a").await.unwrap().unwrap();
    assert_eq!(row.str_id, "a");
    assert!(!row.tombstone);
    assert!(row.expires_at.is_none(), "ttl-less objects are pinned");

    assert!(store.get_object("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn create_with_ttl_sets_expiry() {
    let store = store().await;
    store
        .create_object("a", &[], Some(Duration::from_secs(60)))
        .await
        .unwrap();
    let row = store.get_object("a").await.unwrap().unwrap();
    let expires = row.expires_at.expect("ttl object has expiry");
    assert!(expires > row.created_at);
}

#[tokio::test]
async fn self_reference_is_rejected() {
    let store = store().await;
    match store.create_object("a", &ids(&["a"]), None).await {
        Err(MetadataError::SelfReference(_)) => {}
        other => panic!("unexpected: {other:?}"),
    }
    assert!(store.get_object("a").await.unwrap().is_none());
}

#[tokio::test]
async fn dangling_reference_rolls_back() {
    let store = store().await;
    match store.create_object("a", &ids(&["missing"]), None).await {
        Err(MetadataError::DanglingRef(_)) => {}
        other => panic!("unexpected: {other:?}"),
    }
    // The whole create rolled back; the tracker is untouched.
    assert!(store.get_object("a").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_create_leaves_original_unmodified() {
    let store = store().await;
    store.create_object("a", &[], None).await.unwrap();
    let before = store.get_object("a").await.unwrap().unwrap();

    match store
        .create_object("a", &[], Some(Duration::from_secs(5)))
        .await
    {
        Err(MetadataError::ObjectExists(_)) => {}
        other => panic!("unexpected: {other:?}"),
    }
    let after = store.get_object("a").await.unwrap().unwrap();
    assert_eq!(after.int_id, before.int_id);
    assert!(after.expires_at.is_none(), "existing row kept its expiry");
}

#[tokio::test]
async fn upstream_and_downstream_neighbors() {
    let store = store().await;
    store.create_object("a", &[], None).await.unwrap();
    store.create_object("b", &[], None).await.unwrap();
    store.create_object("c", &ids(&["a", "b"]), None).await.unwrap();

    assert_eq!(store.get_downstream("c").await.unwrap(), vec!["a", "b"]);
    assert_eq!(store.get_upstream("a").await.unwrap(), vec!["c"]);
    assert_eq!(store.get_upstream("c").await.unwrap(), Vec::<String>::new());
    assert_eq!(store.get_downstream("a").await.unwrap(), Vec::<String>::new());
}

#[tokio::test]
async fn tombstone_vetoed_while_referenced() {
    let store = store().await;
    store.create_object("a", &[], None).await.unwrap();
    store.create_object("b", &ids(&["a"]), None).await.unwrap();

    match store.mark_tombstone("a").await {
        Err(MetadataError::DanglingRef(_)) => {}
        other => panic!("unexpected: {other:?}"),
    }
    assert!(!store.get_object("a").await.unwrap().unwrap().tombstone);
}

#[tokio::test]
async fn mark_tombstone_is_idempotent_on_absent_rows() {
    let store = store().await;
    store.mark_tombstone("missing").await.unwrap();
}

#[tokio::test]
async fn delete_protocol_removes_graph_bottom_up() {
    let store = store().await;
    store.create_object("a", &[], None).await.unwrap();
    store.create_object("b", &ids(&["a"]), None).await.unwrap();

    // Deleting the referenced leaf first is vetoed at both steps.
    match store.mark_tombstone("a").await {
        Err(MetadataError::DanglingRef(_)) => {}
        other => panic!("unexpected: {other:?}"),
    }
    match store.finish_delete("b").await {
        Err(MetadataError::NotTombstone(_)) => {}
        other => panic!("unexpected: {other:?}"),
    }
    assert!(store.get_object("b").await.unwrap().is_some());

    // Top-down works: b is unreferenced, then a becomes unreferenced.
    store.mark_tombstone("b").await.unwrap();
    store.finish_delete("b").await.unwrap();
    store.mark_tombstone("a").await.unwrap();
    store.finish_delete("a").await.unwrap();

    assert!(store.get_object("a").await.unwrap().is_none());
    assert!(store.get_object("b").await.unwrap().is_none());
    // Absent rows are fine to finish again.
    store.finish_delete("a").await.unwrap();
}

#[tokio::test]
async fn create_against_tombstoned_row_reports_tombstoned() {
    let store = store().await;
    store.create_object("a", &[], None).await.unwrap();
    store.mark_tombstone("a").await.unwrap();

    match store.create_object("a", &[], None).await {
        Err(MetadataError::Tombstoned(_)) => {}
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn no_live_object_points_to_a_tombstone() {
    let store = store().await;
    store.create_object("a", &[], None).await.unwrap();
    store.create_object("b", &ids(&["a"]), None).await.unwrap();
    store.create_object("c", &ids(&["a"]), None).await.unwrap();

    match store.mark_tombstone("a").await {
        Err(MetadataError::DanglingRef(_)) => {}
        other => panic!("unexpected: {other:?}"),
    }

    store.mark_tombstone("b").await.unwrap();
    store.finish_delete("b").await.unwrap();
    match store.mark_tombstone("a").await {
        Err(MetadataError::DanglingRef(_)) => {}
        other => panic!("unexpected: {other:?}"),
    }

    store.mark_tombstone("c").await.unwrap();
    store.finish_delete("c").await.unwrap();
    store.mark_tombstone("a").await.unwrap();
    assert!(store.get_object("a").await.unwrap().unwrap().tombstone);
}

#[tokio::test]
async fn list_deletable_finds_expired_and_tombstoned() {
    let store = store().await;
    store
        .create_object("expired", &[], Some(Duration::from_millis(10)))
        .await
        .unwrap();
    store.create_object("pinned", &[], None).await.unwrap();
    store.create_object("stoned", &[], None).await.unwrap();
    store.mark_tombstone("stoned").await.unwrap();

    // An expired object that is still referenced stays out of the list.
    store
        .create_object("expired-but-used", &[], Some(Duration::from_millis(10)))
        .await
        .unwrap();
    store
        .create_object("user", &ids(&["expired-but-used"]), None)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut deletable = store.list_deletable(100).await.unwrap();
    deletable.sort();
    assert_eq!(deletable, vec!["expired", "stoned"]);
}

#[tokio::test]
async fn set_ttl_prefix_extends_matching_objects() {
    let store = store().await;
    store
        .create_object("tmp-x/0", &[], Some(Duration::from_millis(50)))
        .await
        .unwrap();
    store
        .create_object("tmp-x/1", &[], Some(Duration::from_millis(50)))
        .await
        .unwrap();
    store
        .create_object("tmp-y/0", &[], Some(Duration::from_millis(50)))
        .await
        .unwrap();

    let before_0 = store.get_object("tmp-x/0").await.unwrap().unwrap();
    let before_y = store.get_object("tmp-y/0").await.unwrap().unwrap();

    let new_expiry = store
        .set_ttl_prefix("tmp-x/", Duration::from_secs(3600))
        .await
        .unwrap();

    let after_0 = store.get_object("tmp-x/0").await.unwrap().unwrap();
    let after_1 = store.get_object("tmp-x/1").await.unwrap().unwrap();
    let after_y = store.get_object("tmp-y/0").await.unwrap().unwrap();

    assert!(after_0.expires_at.unwrap() > before_0.expires_at.unwrap());
    assert_eq!(after_0.expires_at.unwrap(), new_expiry);
    assert_eq!(after_1.expires_at.unwrap(), new_expiry);
    assert_eq!(after_y.expires_at, before_y.expires_at, "other prefixes untouched");
}

#[tokio::test]
async fn object_id_length_is_bounded() {
    let store = store().await;
    let long = "x".repeat(cairn_core::MAX_OBJECT_ID_LEN + 1);
    match store.create_object(&long, &[], None).await {
        Err(MetadataError::InvalidObjectId(_)) => {}
        other => panic!("unexpected: {other:?}"),
    }
}
