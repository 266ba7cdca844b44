//! Index tree writer/reader contract tests.

use cairn_chunk::{ChunkStorage, Client};
use cairn_core::StorageConfig;
use cairn_fileset::{FileOp, FileSetStorage, FileSetStore, Index, IndexReader, IndexWriter, PathRange};
use cairn_metadata::{MetadataStore, SqliteStore};
use cairn_storage::{FilesystemStore, ObjectStore};
use std::sync::Arc;

struct Harness {
    _temp: tempfile::TempDir,
    metadata: Arc<SqliteStore>,
    chunks: Arc<ChunkStorage>,
}

async fn harness() -> Harness {
    let temp = tempfile::tempdir().unwrap();
    let store = Arc::new(FilesystemStore::new(temp.path()).await.unwrap());
    let metadata = Arc::new(SqliteStore::new(":memory:").await.unwrap());
    let chunks = Arc::new(ChunkStorage::new(
        store as Arc<dyn ObjectStore>,
        metadata.clone() as Arc<dyn MetadataStore>,
        &StorageConfig::default(),
    ));
    Harness {
        _temp: temp,
        metadata,
        chunks,
    }
}

/// Every permutation of `alphabet`, in lexicographic order. Fixed-length
/// permutations are prefix-free, so an exact path works as a singleton
/// prefix filter.
fn generate(alphabet: &str) -> Vec<String> {
    fn recurse(chars: &[char], used: &mut Vec<bool>, prefix: &mut String, out: &mut Vec<String>) {
        if prefix.len() == chars.len() {
            out.push(prefix.clone());
            return;
        }
        for i in 0..chars.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            prefix.push(chars[i]);
            recurse(chars, used, prefix, out);
            prefix.pop();
            used[i] = false;
        }
    }
    let chars: Vec<char> = alphabet.chars().collect();
    let mut out = Vec::new();
    recurse(
        &chars,
        &mut vec![false; chars.len()],
        &mut String::new(),
        &mut out,
    );
    out
}

/// Low split threshold so even small path sets produce real trees.
const TEST_AVERAGE_BITS: u32 = 7;

async fn write_with_bits(
    harness: &Harness,
    paths: &[String],
    average_bits: u32,
) -> (Arc<Client>, Index) {
    let client = Arc::new(harness.chunks.new_client(Some("index-test")));
    let mut writer = IndexWriter::new(client.clone(), average_bits);
    for path in paths {
        writer
            .write_index(Index::leaf(path.clone(), FileOp::put(), vec![]))
            .await
            .unwrap();
    }
    let root = writer.close().await.unwrap();
    (client, root)
}

async fn write(harness: &Harness, paths: &[String]) -> (Arc<Client>, Index) {
    write_with_bits(harness, paths, TEST_AVERAGE_BITS).await
}

async fn actual_paths(client: &Arc<Client>, root: &Index, filter: Filter<'_>) -> Vec<String> {
    let reader = IndexReader::new(client.clone(), root.clone());
    let reader = match filter {
        Filter::None => reader,
        Filter::Prefix(p) => reader.with_prefix(p),
        Filter::Range(lower, upper) => reader.with_range(PathRange {
            lower: lower.to_string(),
            upper: upper.to_string(),
        }),
    };
    let mut result = Vec::new();
    reader
        .iterate(|entry| {
            result.push(entry.path.clone());
            Ok(())
        })
        .await
        .unwrap();
    result
}

enum Filter<'a> {
    None,
    Prefix(&'a str),
    Range(&'a str, &'a str),
}

fn expected_with_prefix(paths: &[String], prefix: &str) -> Vec<String> {
    paths
        .iter()
        .filter(|p| p.starts_with(prefix))
        .cloned()
        .collect()
}

/// The permutation check: write the sorted path set, then verify full
/// iteration plus first/middle/last paths as both prefix and singleton
/// range, and first-character prefixes as both filters.
async fn check(alphabet: &str, average_bits: u32) {
    let harness = harness().await;
    let paths = generate(alphabet);
    let (client, root) = write_with_bits(&harness, &paths, average_bits).await;

    // Full iteration returns every path in order.
    assert_eq!(actual_paths(&client, &root, Filter::None).await, paths);

    for probe in [0, paths.len() / 2, paths.len() - 1] {
        let path = &paths[probe];

        // The exact path as a prefix and as a singleton range.
        let expected = vec![path.clone()];
        assert_eq!(
            actual_paths(&client, &root, Filter::Prefix(path)).await,
            expected
        );
        assert_eq!(
            actual_paths(&client, &root, Filter::Range(path, path)).await,
            expected
        );

        // Its first character as a prefix, and that slice as a range.
        let first_char = path[..1].to_string();
        let expected = expected_with_prefix(&paths, &first_char);
        assert_eq!(
            actual_paths(&client, &root, Filter::Prefix(&first_char)).await,
            expected
        );
        assert_eq!(
            actual_paths(
                &client,
                &root,
                Filter::Range(&expected[0], &expected[expected.len() - 1])
            )
            .await,
            expected
        );
    }

    client.close().await.unwrap();
}

#[tokio::test]
async fn single_level() {
    check("abc", TEST_AVERAGE_BITS).await;
}

#[tokio::test]
async fn multi_level() {
    // A larger average keeps the 5040-path tree to a sane chunk count.
    check("abcdefg", 10).await;
}

#[tokio::test]
async fn range_over_everything_returns_all() {
    let harness = harness().await;
    let paths = generate("abcde");
    let (client, root) = write(&harness, &paths).await;
    let all = actual_paths(
        &client,
        &root,
        Filter::Range(&paths[0], &paths[paths.len() - 1]),
    )
    .await;
    assert_eq!(all, paths);
    client.close().await.unwrap();
}

#[tokio::test]
async fn empty_writer_yields_childless_root() {
    let harness = harness().await;
    let (client, root) = write(&harness, &[]).await;
    assert!(root.is_empty_root());
    assert!(actual_paths(&client, &root, Filter::None).await.is_empty());
    client.close().await.unwrap();
}

#[tokio::test]
async fn single_entry_root_is_the_leaf() {
    let harness = harness().await;
    let paths = vec!["abc".to_string()];
    let (client, root) = write(&harness, &paths).await;
    assert_eq!(root.path, "abc");
    assert!(root.file_op.is_some());
    assert!(root.range.is_none(), "the root IS the leaf");

    assert_eq!(actual_paths(&client, &root, Filter::None).await, paths);
    assert_eq!(actual_paths(&client, &root, Filter::Prefix("a")).await, paths);
    assert!(actual_paths(&client, &root, Filter::Prefix("b")).await.is_empty());
    client.close().await.unwrap();
}

#[tokio::test]
async fn writer_rejects_out_of_order_paths() {
    let harness = harness().await;
    let client = Arc::new(harness.chunks.new_client(Some("order")));
    let mut writer = IndexWriter::new(client.clone(), TEST_AVERAGE_BITS);
    writer
        .write_index(Index::leaf("b", FileOp::put(), vec![]))
        .await
        .unwrap();
    for dup in ["b", "a"] {
        match writer
            .write_index(Index::leaf(dup, FileOp::put(), vec![]))
            .await
        {
            Err(cairn_fileset::FilesetError::PathOutOfOrder { .. }) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }
    client.close().await.unwrap();
}

#[tokio::test]
async fn prefix_filter_is_case_sensitive() {
    let harness = harness().await;
    let paths: Vec<String> = ["Apple", "apple", "apricot"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let (client, root) = write(&harness, &paths).await;
    assert_eq!(
        actual_paths(&client, &root, Filter::Prefix("ap")).await,
        vec!["apple", "apricot"]
    );
    assert_eq!(
        actual_paths(&client, &root, Filter::Prefix("Ap")).await,
        vec!["Apple"]
    );
    client.close().await.unwrap();
}

#[tokio::test]
async fn fileset_store_roundtrips_roots() {
    let harness = harness().await;
    let paths = generate("abc");
    let (client, root) = write(&harness, &paths).await;

    let store = FileSetStore::new(harness.metadata.clone() as Arc<dyn MetadataStore>);
    store.put_index("sets/main", Some(&root)).await.unwrap();
    let loaded = store.get_index("sets/main").await.unwrap();
    assert_eq!(loaded, root);

    // A reloaded root iterates identically.
    assert_eq!(actual_paths(&client, &loaded, Filter::None).await, paths);

    store.put_index("sets/empty", None).await.unwrap();
    assert!(store.get_index("sets/empty").await.unwrap().is_empty_root());

    assert_eq!(
        store.walk("sets/").await.unwrap(),
        vec!["sets/empty", "sets/main"]
    );
    store.delete("sets/main").await.unwrap();
    assert_eq!(store.walk("sets/").await.unwrap(), vec!["sets/empty"]);

    client.close().await.unwrap();
}

#[tokio::test]
async fn open_cap_blocks_past_the_limit() {
    let temp = tempfile::tempdir().unwrap();
    let store = Arc::new(FilesystemStore::new(temp.path()).await.unwrap());
    let metadata = Arc::new(SqliteStore::new(":memory:").await.unwrap());
    let mut config = StorageConfig::default();
    config.max_open_filesets = 1;
    let chunks = Arc::new(ChunkStorage::new(
        store as Arc<dyn ObjectStore>,
        metadata.clone() as Arc<dyn MetadataStore>,
        &config,
    ));
    let filesets = FileSetStorage::new(chunks, metadata as Arc<dyn MetadataStore>, &config);
    filesets.store().put_index("p", None).await.unwrap();

    let open = filesets.open("p").await.unwrap();
    // The second open waits on the permit until the first is dropped.
    let second = tokio::time::timeout(std::time::Duration::from_millis(50), filesets.open("p"));
    assert!(second.await.is_err(), "second open blocked by the cap");

    drop(open);
    filesets.open("p").await.unwrap();
}
