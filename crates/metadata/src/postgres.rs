//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::TrackedObjectRow;
use crate::repos::{ChunkMetadataRepo, PathRepo, Tracker};
use crate::store::{MetadataStore, dedup_targets, validate_object_id};
use async_trait::async_trait;
use cairn_core::{ChunkId, ChunkMetadata, Compression};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;

/// PostgreSQL schema. The tracker tables live in a dedicated `storage`
/// schema; `tracker_refs` keys on the dense surrogate ids to stay compact.
const POSTGRES_SCHEMA: &str = r#"
CREATE SCHEMA IF NOT EXISTS storage;

CREATE TABLE IF NOT EXISTS storage.tracker_objects (
    int_id BIGSERIAL PRIMARY KEY,
    str_id VARCHAR(4096) UNIQUE,
    tombstone BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
    expires_at TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS idx_tracker_objects_expires
    ON storage.tracker_objects(expires_at);

CREATE TABLE IF NOT EXISTS storage.tracker_refs (
    from_id INT8 NOT NULL,
    to_id INT8 NOT NULL,
    PRIMARY KEY (from_id, to_id)
);
CREATE INDEX IF NOT EXISTS idx_tracker_refs_to ON storage.tracker_refs(to_id);

CREATE TABLE IF NOT EXISTS storage.chunk_metadata (
    chunk_hash VARCHAR(64) PRIMARY KEY,
    points_to TEXT NOT NULL,
    compression VARCHAR(16) NOT NULL,
    size_bytes BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS storage.paths (
    path VARCHAR(250) PRIMARY KEY,
    index_blob BYTEA NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

fn schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(url: &str, max_connections: u32) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        for statement in schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Tracker for PostgresStore {
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
            "INSERT INTO storage.tracker_objects (str_id, created_at, expires_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (str_id) DO NOTHING
             RETURNING int_id",
        )
        .bind(id)
        .bind(now)
        .bind(expires_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(int_id) = int_id else {
            let tombstone: Option<bool> = sqlx::query_scalar(
                "SELECT tombstone FROM storage.tracker_objects WHERE str_id = $1",
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
            return if tombstone == Some(true) {
                Err(MetadataError::Tombstoned(id.to_string()))
            } else {
                Err(MetadataError::ObjectExists(id.to_string()))
            };
        };

        let targets: Vec<String> = dedup_targets(points_to)
            .into_iter()
            .map(str::to_string)
            .collect();
        let inserted: Vec<i64> = sqlx::query_scalar(
            "INSERT INTO storage.tracker_refs (from_id, to_id)
             SELECT $1, int_id FROM storage.tracker_objects WHERE str_id = ANY($2)
             RETURNING to_id",
        )
        .bind(int_id)
        .bind(&targets)
        .fetch_all(&mut *tx)
        .await?;
        if inserted.len() != targets.len() {
            return Err(MetadataError::DanglingRef(id.to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn set_ttl_prefix(&self, prefix: &str, ttl: Duration) -> MetadataResult<OffsetDateTime> {
        let expires_at = OffsetDateTime::now_utc() + ttl;
        sqlx::query(
            "UPDATE storage.tracker_objects SET expires_at = $1 WHERE str_id LIKE $2 || '%'",
        )
        .bind(expires_at)
        .bind(prefix)
        .execute(&self.pool)
        .await?;
        Ok(expires_at)
    }

    async fn get_downstream(&self, id: &str) -> MetadataResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT dst.str_id
             FROM storage.tracker_objects src
             JOIN storage.tracker_refs r ON r.from_id = src.int_id
             JOIN storage.tracker_objects dst ON dst.int_id = r.to_id
             WHERE src.str_id = $1
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
             FROM storage.tracker_objects dst
             JOIN storage.tracker_refs r ON r.to_id = dst.int_id
             JOIN storage.tracker_objects src ON src.int_id = r.from_id
             WHERE dst.str_id = $1
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
             FROM storage.tracker_objects WHERE str_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn mark_tombstone(&self, id: &str) -> MetadataResult<()> {
        let tombstone: Option<bool> = sqlx::query_scalar(
            "UPDATE storage.tracker_objects
             SET tombstone = tombstone OR NOT EXISTS (
                 SELECT 1 FROM storage.tracker_refs
                 WHERE to_id = storage.tracker_objects.int_id
             )
             WHERE str_id = $1
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
            "DELETE FROM storage.tracker_objects WHERE str_id = $1 RETURNING int_id, tombstone",
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
                sqlx::query("DELETE FROM storage.tracker_refs WHERE from_id = $1")
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
            "SELECT str_id FROM storage.tracker_objects
             WHERE (tombstone OR (expires_at IS NOT NULL AND expires_at <= $1))
               AND NOT EXISTS (
                   SELECT 1 FROM storage.tracker_refs
                   WHERE to_id = storage.tracker_objects.int_id
               )
             LIMIT $2",
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(s,)| s).collect())
    }
}

#[async_trait]
impl ChunkMetadataRepo for PostgresStore {
    async fn set_chunk_metadata(
        &self,
        chunk_id: &ChunkId,
        metadata: &ChunkMetadata,
    ) -> MetadataResult<()> {
        let points_to = serde_json::to_string(&metadata.points_to)?;
        sqlx::query(
            "INSERT INTO storage.chunk_metadata
                 (chunk_hash, points_to, compression, size_bytes, created_at)
             VALUES ($1, $2, $3, $4, $5)
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
            "SELECT points_to, compression, size_bytes
             FROM storage.chunk_metadata WHERE chunk_hash = $1",
        )
        .bind(chunk_id.to_hex())
        .fetch_optional(&self.pool)
        .await?;

        let Some((points_to, compression, size_bytes)) = row else {
            return Ok(None);
        };
        let points_to: Vec<ChunkId> = serde_json::from_str(&points_to)?;
        let compression = Compression::from_str_opt(&compression)
            .ok_or_else(|| MetadataError::Internal(format!("unknown compression: {compression}")))?;
        Ok(Some(ChunkMetadata {
            points_to,
            compression,
            size_bytes: size_bytes as u64,
        }))
    }

    async fn delete_chunk_metadata(&self, chunk_id: &ChunkId) -> MetadataResult<()> {
        sqlx::query("DELETE FROM storage.chunk_metadata WHERE chunk_hash = $1")
            .bind(chunk_id.to_hex())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PathRepo for PostgresStore {
    async fn put_index(&self, path: &str, index_blob: &[u8]) -> MetadataResult<()> {
        sqlx::query(
            "INSERT INTO storage.paths (path, index_blob, created_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (path) DO UPDATE SET index_blob = EXCLUDED.index_blob",
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
            sqlx::query_as("SELECT index_blob FROM storage.paths WHERE path = $1")
                .bind(path)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some((blob,)) => Ok(blob),
            None => Err(MetadataError::PathNotExists(path.to_string())),
        }
    }

    async fn walk_paths(&self, prefix: &str) -> MetadataResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT path FROM storage.paths WHERE path LIKE $1 || '%' ORDER BY path",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(p,)| p).collect())
    }

    async fn delete_path(&self, path: &str) -> MetadataResult<()> {
        sqlx::query("DELETE FROM storage.paths WHERE path = $1")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
