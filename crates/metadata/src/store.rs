//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{ChunkMetadataRepo, PathRepo, Tracker};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: Tracker + ChunkMetadataRepo + PathRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// Reject ids the schema cannot hold.
pub(crate) fn validate_object_id(id: &str) -> MetadataResult<()> {
    if id.is_empty() {
        return Err(MetadataError::InvalidObjectId("empty id".to_string()));
    }
    if id.len() > cairn_core::MAX_OBJECT_ID_LEN {
        return Err(MetadataError::InvalidObjectId(format!(
            "id length {} exceeds {}",
            id.len(),
            cairn_core::MAX_OBJECT_ID_LEN
        )));
    }
    Ok(())
}

/// Dedupe reference targets so the edge count check compares sets.
pub(crate) fn dedup_targets(points_to: &[String]) -> Vec<&str> {
    let mut targets: Vec<&str> = points_to.iter().map(String::as_str).collect();
    targets.sort_unstable();
    targets.dedup();
    targets
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store. Pass `":memory:"` for an in-memory
    /// database (tests).
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // avoids persistent "database is locked" failures under load.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        tracing::debug!("metadata schema ensured");
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::models::TrackedObjectRow;
    use cairn_core::{ChunkId, ChunkMetadata, Compression};
    use time::OffsetDateTime;

    #[async_trait]
    impl Tracker for SqliteStore {
        async fn create_object(
            &self,
            id: &str,
            points_to: &[String],
            ttl: Option<Duration>,
        ) -> MetadataResult<()> {
            validate_object_id(id)?;
            for target in points_to {
                if target == id {
                    return Err(MetadataError::SelfReference(id.to_string()));
                }
            }

            let now = OffsetDateTime::now_utc();
            let expires_at = ttl.map(|t| now + t);

            let mut tx = self.pool.begin().await?;

            let int_id: Option<i64> = sqlx::query_scalar(
                "INSERT INTO tracker_objects (str_id, tombstone, created_at, expires_at)
                 VALUES (?, FALSE, ?, ?)
                 ON CONFLICT (str_id) DO NOTHING
                 RETURNING int_id",
            )
            .bind(id)
            .bind(now)
            .bind(expires_at)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(int_id) = int_id else {
                // The row already exists, untouched. Distinguish a plain
                // collision from a row the GC has already condemned.
                let tombstone: Option<bool> =
                    sqlx::query_scalar("SELECT tombstone FROM tracker_objects WHERE str_id = ?")
                        .bind(id)
                        .fetch_optional(&mut *tx)
                        .await?;
                return if tombstone == Some(true) {
                    Err(MetadataError::Tombstoned(id.to_string()))
                } else {
                    Err(MetadataError::ObjectExists(id.to_string()))
                };
            };

            // Insert edges by joining against existing rows. Fewer edges
            // than targets means at least one target is missing, and the
            // dropped transaction rolls the object row back out.
            let targets = dedup_targets(points_to);
            let mut inserted = 0u64;
            for target in &targets {
                let result = sqlx::query(
                    "INSERT INTO tracker_refs (from_id, to_id)
                     SELECT ?, int_id FROM tracker_objects WHERE str_id = ?",
                )
                .bind(int_id)
                .bind(target)
                .execute(&mut *tx)
                .await?;
                inserted += result.rows_affected();
            }
            if inserted != targets.len() as u64 {
                return Err(MetadataError::DanglingRef(id.to_string()));
            }

            tx.commit().await?;
            Ok(())
        }

        async fn set_ttl_prefix(
            &self,
            prefix: &str,
            ttl: Duration,
        ) -> MetadataResult<OffsetDateTime> {
            let expires_at = OffsetDateTime::now_utc() + ttl;
            sqlx::query("UPDATE tracker_objects SET expires_at = ? WHERE str_id LIKE ? || '%'")
                .bind(expires_at)
                .bind(prefix)
                .execute(&self.pool)
                .await?;
            Ok(expires_at)
        }

        async fn get_downstream(&self, id: &str) -> MetadataResult<Vec<String>> {
            let rows: Vec<(String,)> = sqlx::query_as(
                "SELECT dst.str_id
                 FROM tracker_objects src
                 JOIN tracker_refs r ON r.from_id = src.int_id
                 JOIN tracker_objects dst ON dst.int_id = r.to_id
                 WHERE src.str_id = ?
                 ORDER BY dst.str_id",
            )
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(|(s,)| s).collect())
        }

        async fn get_upstream(&self, id: &str) -> MetadataResult<Vec<String>> {
            let rows: Vec<(String,)> = sqlx::query_as(
                "SELECT src.str_id
                 FROM tracker_objects dst
                 JOIN tracker_refs r ON r.to_id = dst.int_id
                 JOIN tracker_objects src ON src.int_id = r.from_id
                 WHERE dst.str_id = ?
                 ORDER BY src.str_id",
            )
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(|(s,)| s).collect())
        }

        async fn get_object(&self, id: &str) -> MetadataResult<Option<TrackedObjectRow>> {
            let row = sqlx::query_as::<_, TrackedObjectRow>(
                "SELECT int_id, str_id, tombstone, created_at, expires_at
                 FROM tracker_objects WHERE str_id = ?",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn mark_tombstone(&self, id: &str) -> MetadataResult<()> {
            // tombstone OR ... keeps the flag monotonic: once condemned, an
            // object never comes back even if an edge appears afterwards.
            let tombstone: Option<bool> = sqlx::query_scalar(
                "UPDATE tracker_objects
                 SET tombstone = tombstone OR NOT EXISTS (
                     SELECT 1 FROM tracker_refs WHERE to_id = tracker_objects.int_id
                 )
                 WHERE str_id = ?
                 RETURNING tombstone",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

            match tombstone {
                None => Ok(()),
                Some(true) => Ok(()),
                Some(false) => Err(MetadataError::DanglingRef(id.to_string())),
            }
        }

        async fn finish_delete(&self, id: &str) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            let row: Option<(i64, bool)> = sqlx::query_as(
                "DELETE FROM tracker_objects WHERE str_id = ? RETURNING int_id, tombstone",
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

            match row {
                None => {
                    tx.commit().await?;
                    Ok(())
                }
                Some((_, false)) => Err(MetadataError::NotTombstone(id.to_string())),
                Some((int_id, true)) => {
                    sqlx::query("DELETE FROM tracker_refs WHERE from_id = ?")
                        .bind(int_id)
                        .execute(&mut *tx)
                        .await?;
                    tx.commit().await?;
                    Ok(())
                }
            }
        }

        async fn list_deletable(&self, limit: u32) -> MetadataResult<Vec<String>> {
            let now = OffsetDateTime::now_utc();
            let rows: Vec<(String,)> = sqlx::query_as(
                "SELECT str_id FROM tracker_objects
                 WHERE (tombstone OR (expires_at IS NOT NULL AND expires_at <= ?))
                   AND NOT EXISTS (
                       SELECT 1 FROM tracker_refs WHERE to_id = tracker_objects.int_id
                   )
                 LIMIT ?",
            )
            .bind(now)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(|(s,)| s).collect())
        }
    }

    #[async_trait]
    impl ChunkMetadataRepo for SqliteStore {
        async fn set_chunk_metadata(
            &self,
            chunk_id: &ChunkId,
            metadata: &ChunkMetadata,
        ) -> MetadataResult<()> {
            let points_to = serde_json::to_string(&metadata.points_to)?;
            sqlx::query(
                "INSERT INTO chunk_metadata (chunk_hash, points_to, compression, size_bytes, created_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT (chunk_hash) DO NOTHING",
            )
            .bind(chunk_id.to_hex())
            .bind(points_to)
            .bind(metadata.compression.as_str())
            .bind(metadata.size_bytes as i64)
            .bind(OffsetDateTime::now_utc())
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_chunk_metadata(
            &self,
            chunk_id: &ChunkId,
        ) -> MetadataResult<Option<ChunkMetadata>> {
            let row: Option<(String, String, i64)> = sqlx::query_as(
                "SELECT points_to, compression, size_bytes FROM chunk_metadata WHERE chunk_hash = ?",
            )
            .bind(chunk_id.to_hex())
            .fetch_optional(&self.pool)
            .await?;

            let Some((points_to, compression, size_bytes)) = row else {
                return Ok(None);
            };
            let points_to: Vec<ChunkId> = serde_json::from_str(&points_to)?;
            let compression = Compression::from_str_opt(&compression).ok_or_else(|| {
                MetadataError::Internal(format!("unknown compression: {compression}"))
            })?;
            Ok(Some(ChunkMetadata {
                points_to,
                compression,
                size_bytes: size_bytes as u64,
            }))
        }

        async fn delete_chunk_metadata(&self, chunk_id: &ChunkId) -> MetadataResult<()> {
            sqlx::query("DELETE FROM chunk_metadata WHERE chunk_hash = ?")
                .bind(chunk_id.to_hex())
                .execute(&self.pool)
                .await?;
            Ok(())
        }
    }

    #[async_trait]
    impl PathRepo for SqliteStore {
        async fn put_index(&self, path: &str, index_blob: &[u8]) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO paths (path, index_blob, created_at)
                 VALUES (?, ?, ?)
                 ON CONFLICT (path) DO UPDATE SET index_blob = excluded.index_blob",
            )
            .bind(path)
            .bind(index_blob)
            .bind(OffsetDateTime::now_utc())
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_index(&self, path: &str) -> MetadataResult<Vec<u8>> {
            let row: Option<(Vec<u8>,)> =
                sqlx::query_as("SELECT index_blob FROM paths WHERE path = ?")
                    .bind(path)
                    .fetch_optional(&self.pool)
                    .await?;
            match row {
                Some((blob,)) => Ok(blob),
                None => Err(MetadataError::PathNotExists(path.to_string())),
            }
        }

        async fn walk_paths(&self, prefix: &str) -> MetadataResult<Vec<String>> {
            let rows: Vec<(String,)> =
                sqlx::query_as("SELECT path FROM paths WHERE path LIKE ? || '%' ORDER BY path")
                    .bind(prefix)
                    .fetch_all(&self.pool)
                    .await?;
            Ok(rows.into_iter().map(|(p,)| p).collect())
        }

        async fn delete_path(&self, path: &str) -> MetadataResult<()> {
            sqlx::query("DELETE FROM paths WHERE path = ?")
                .bind(path)
                .execute(&self.pool)
                .await?;
            Ok(())
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Object tracker: the reference graph.
CREATE TABLE IF NOT EXISTS tracker_objects (
    int_id INTEGER PRIMARY KEY AUTOINCREMENT,
    str_id TEXT NOT NULL UNIQUE,
    tombstone INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    expires_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_tracker_objects_expires ON tracker_objects(expires_at);

CREATE TABLE IF NOT EXISTS tracker_refs (
    from_id INTEGER NOT NULL,
    to_id INTEGER NOT NULL,
    PRIMARY KEY (from_id, to_id)
);
CREATE INDEX IF NOT EXISTS idx_tracker_refs_to ON tracker_refs(to_id);

-- Chunk-level metadata keyed by content hash.
CREATE TABLE IF NOT EXISTS chunk_metadata (
    chunk_hash TEXT PRIMARY KEY,
    points_to TEXT NOT NULL,
    compression TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

-- Serialized index roots keyed by path.
CREATE TABLE IF NOT EXISTS paths (
    path TEXT PRIMARY KEY,
    index_blob BLOB NOT NULL,
    created_at TEXT NOT NULL
);
"#;
