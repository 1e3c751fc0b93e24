// SPDX-License-Identifier: Apache-2.0
//! The transactional bucket/object metadata store.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;

use crate::bucket::{Bucket, CreateBucketOptions};
use crate::error::{Result, StoreError};
use crate::object::{ListObjectsOptions, ListObjectsResult, Object, MAX_KEYS_CAP, MAX_KEYS_DEFAULT};
use crate::schema::SCHEMA;

/// Transactional store for buckets and objects, backed by SQLite.
///
/// A process-wide `RwLock` serializes access at the API boundary, layered on
/// top of the engine's own transactions. Mutating operations take the write
/// half; reads take the read half.
pub struct MetadataStore {
    pool: SqlitePool,
    guard: RwLock<()>,
}

impl MetadataStore {
    /// Open (creating if necessary) the SQLite database at `db_path`,
    /// enable WAL + foreign keys, and run the idempotent schema upgrade.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self {
            pool,
            guard: RwLock::new(()),
        })
    }

    /// Construct directly from an open pool (used by tests with an
    /// in-memory or temp-file database already migrated).
    #[doc(hidden)]
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            guard: RwLock::new(()),
        }
    }

    /// Create a bucket, rejecting a name already in use.
    pub async fn create_bucket(
        &self,
        name: &str,
        owner_id: &str,
        opts: CreateBucketOptions,
    ) -> Result<Bucket> {
        if !crate::bucket::is_valid_bucket_name(name) {
            return Err(StoreError::InvalidName);
        }
        let _guard = self.guard.write().await;

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO buckets (name, owner_id, public, quota_bytes, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(owner_id)
        .bind(opts.public)
        .bind(opts.quota_bytes)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => self.fetch_bucket_by_name(name).await,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::BucketExists)
            }
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    async fn fetch_bucket_by_name(&self, name: &str) -> Result<Bucket> {
        let row = sqlx::query(
            "SELECT b.id, b.name, b.owner_id, b.public, b.quota_bytes, b.created_at, b.updated_at,
                    COUNT(o.id) AS object_count, COALESCE(SUM(o.size), 0) AS total_size
             FROM buckets b
             LEFT JOIN objects o ON o.bucket_id = b.id
             WHERE b.name = ?
             GROUP BY b.id",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::BucketNotFound)?;

        Ok(row_to_bucket(&row))
    }

    /// Fetch a bucket by name, with its derived object count and total size.
    pub async fn get_bucket(&self, name: &str) -> Result<Bucket> {
        let _guard = self.guard.read().await;
        self.fetch_bucket_by_name(name).await
    }

    /// Fetch a bucket by its internal numeric id.
    pub async fn get_bucket_by_id(&self, id: i64) -> Result<Bucket> {
        let _guard = self.guard.read().await;
        let row = sqlx::query(
            "SELECT b.id, b.name, b.owner_id, b.public, b.quota_bytes, b.created_at, b.updated_at,
                    COUNT(o.id) AS object_count, COALESCE(SUM(o.size), 0) AS total_size
             FROM buckets b
             LEFT JOIN objects o ON o.bucket_id = b.id
             WHERE b.id = ?
             GROUP BY b.id",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::BucketNotFound)?;
        Ok(row_to_bucket(&row))
    }

    /// Delete a bucket: atomic check-empty-then-delete within one
    /// transaction, so a concurrent `PutObject` can never slip in between
    /// the emptiness check and the row deletion.
    pub async fn delete_bucket(&self, name: &str) -> Result<()> {
        let _guard = self.guard.write().await;
        let mut tx = self.pool.begin().await?;

        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM buckets WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(id) = id else {
            return Err(StoreError::BucketNotFound);
        };

        let object_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM objects WHERE bucket_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if object_count > 0 {
            return Err(StoreError::BucketNotEmpty);
        }

        sqlx::query("DELETE FROM buckets WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// List every bucket owned by `owner_id`, ordered by name.
    pub async fn list_buckets(&self, owner_id: &str) -> Result<Vec<Bucket>> {
        let _guard = self.guard.read().await;
        let rows = sqlx::query(
            "SELECT b.id, b.name, b.owner_id, b.public, b.quota_bytes, b.created_at, b.updated_at,
                    COUNT(o.id) AS object_count, COALESCE(SUM(o.size), 0) AS total_size
             FROM buckets b
             LEFT JOIN objects o ON o.bucket_id = b.id
             WHERE b.owner_id = ?
             GROUP BY b.id
             ORDER BY b.name ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_bucket).collect())
    }

    /// Check whether a bucket with this name exists.
    pub async fn bucket_exists(&self, name: &str) -> Result<bool> {
        let _guard = self.guard.read().await;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM buckets WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Owner is always allowed; public buckets allow any caller; otherwise
    /// denied.
    pub async fn check_access(&self, bucket_name: &str, user_id: &str) -> Result<()> {
        let bucket = self.get_bucket(bucket_name).await?;
        if bucket.owner_id == user_id || bucket.public {
            Ok(())
        } else {
            Err(StoreError::AccessDenied)
        }
    }

    /// Upsert an object row by `(bucket_name, key)`.
    pub async fn put_object(
        &self,
        bucket_name: &str,
        key: &str,
        hash: &str,
        size: i64,
        content_type: Option<&str>,
        metadata: Option<&HashMap<String, String>>,
    ) -> Result<Object> {
        if !cas_gateway_core::is_valid_hash(hash) {
            return Err(StoreError::InvalidHash);
        }
        let _guard = self.guard.write().await;

        let bucket_id: i64 = sqlx::query_scalar("SELECT id FROM buckets WHERE name = ?")
            .bind(bucket_name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::BucketNotFound)?;

        let metadata_json = metadata
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO objects (bucket_id, key, hash, size, content_type, metadata, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(bucket_id, key) DO UPDATE SET
                hash = excluded.hash,
                size = excluded.size,
                content_type = excluded.content_type,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at",
        )
        .bind(bucket_id)
        .bind(key)
        .bind(hash)
        .bind(size)
        .bind(content_type)
        .bind(metadata_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.fetch_object(bucket_id, key).await
    }

    async fn fetch_object(&self, bucket_id: i64, key: &str) -> Result<Object> {
        let row = sqlx::query(
            "SELECT id, bucket_id, key, hash, size, content_type, metadata, created_at, updated_at
             FROM objects WHERE bucket_id = ? AND key = ?",
        )
        .bind(bucket_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::ObjectNotFound)?;
        row_to_object(&row)
    }

    /// Fetch one object row by bucket name and key.
    pub async fn get_object(&self, bucket_name: &str, key: &str) -> Result<Object> {
        let _guard = self.guard.read().await;
        let bucket_id: i64 = sqlx::query_scalar("SELECT id FROM buckets WHERE name = ?")
            .bind(bucket_name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::BucketNotFound)?;
        self.fetch_object(bucket_id, key).await
    }

    /// Delete an object row, failing with `ObjectNotFound` if zero rows were
    /// affected. Removes only the metadata row — the CAS blob is left for a
    /// future GC process to reclaim once unreferenced.
    pub async fn delete_object(&self, bucket_name: &str, key: &str) -> Result<()> {
        let _guard = self.guard.write().await;
        let bucket_id: i64 = sqlx::query_scalar("SELECT id FROM buckets WHERE name = ?")
            .bind(bucket_name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::BucketNotFound)?;

        let result = sqlx::query("DELETE FROM objects WHERE bucket_id = ? AND key = ?")
            .bind(bucket_id)
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            Err(StoreError::ObjectNotFound)
        } else {
            Ok(())
        }
    }

    /// List objects with a prefix filter, opaque numeric cursor, `max_keys`
    /// (default/cap 1000), and common-prefix synthesis when `delimiter` is
    /// set.
    pub async fn list_objects(
        &self,
        bucket_name: &str,
        opts: ListObjectsOptions,
    ) -> Result<ListObjectsResult> {
        let _guard = self.guard.read().await;
        let bucket_id: i64 = sqlx::query_scalar("SELECT id FROM buckets WHERE name = ?")
            .bind(bucket_name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::BucketNotFound)?;

        let max_keys = opts
            .max_keys
            .unwrap_or(MAX_KEYS_DEFAULT)
            .min(MAX_KEYS_CAP)
            .max(1);
        let cursor = opts.cursor.unwrap_or(0);
        let prefix_pattern = opts
            .prefix
            .as_deref()
            .map(|p| format!("{}%", p.replace('%', "\\%").replace('_', "\\_")));

        // Fetch one extra row to determine truncation without a second query.
        let fetch_limit = i64::from(max_keys) + 1;
        let rows = match &prefix_pattern {
            Some(pattern) => {
                sqlx::query(
                    "SELECT id, bucket_id, key, hash, size, content_type, metadata, created_at, updated_at
                     FROM objects
                     WHERE bucket_id = ? AND id > ? AND key LIKE ? ESCAPE '\\'
                     ORDER BY id ASC
                     LIMIT ?",
                )
                .bind(bucket_id)
                .bind(cursor)
                .bind(pattern)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, bucket_id, key, hash, size, content_type, metadata, created_at, updated_at
                     FROM objects
                     WHERE bucket_id = ? AND id > ?
                     ORDER BY id ASC
                     LIMIT ?",
                )
                .bind(bucket_id)
                .bind(cursor)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut objects: Vec<Object> = rows
            .iter()
            .map(row_to_object)
            .collect::<Result<Vec<_>>>()?;

        let is_truncated = objects.len() > max_keys as usize;
        if is_truncated {
            objects.truncate(max_keys as usize);
        }
        let next_cursor = if is_truncated {
            objects.last().map(|o| o.id)
        } else {
            None
        };

        let common_prefixes = if let Some(delimiter) = opts.delimiter.as_deref() {
            let query_prefix = opts.prefix.as_deref().unwrap_or("");
            let mut seen = std::collections::BTreeSet::new();
            for object in &objects {
                let Some(rest) = object.key.strip_prefix(query_prefix) else {
                    continue;
                };
                if let Some(delim_pos) = rest.find(delimiter) {
                    let end = delim_pos + delimiter.len();
                    seen.insert(format!("{query_prefix}{}", &rest[..end]));
                }
            }
            seen.into_iter().collect()
        } else {
            Vec::new()
        };

        Ok(ListObjectsResult {
            objects,
            common_prefixes,
            is_truncated,
            next_cursor,
        })
    }

    /// Distinct bucket names that reference `hash`, ordered by name.
    pub async fn get_hash_references(&self, hash: &str) -> Result<Vec<String>> {
        let _guard = self.guard.read().await;
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT b.name FROM objects o
             JOIN buckets b ON b.id = o.bucket_id
             WHERE o.hash = ?
             ORDER BY b.name ASC",
        )
        .bind(hash)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Whether any object still references `hash`.
    pub async fn is_hash_referenced(&self, hash: &str) -> Result<bool> {
        let _guard = self.guard.read().await;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM objects WHERE hash = ?")
            .bind(hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Close the underlying connection pool. Called during the server
    /// shell's shutdown sequence, after the health loop has stopped and
    /// before axum's graceful drain finishes.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_bucket(row: &sqlx::sqlite::SqliteRow) -> Bucket {
    Bucket {
        id: row.get("id"),
        name: row.get("name"),
        owner_id: row.get("owner_id"),
        public: row.get::<i64, _>("public") != 0,
        quota_bytes: row.get("quota_bytes"),
        created_at: parse_timestamp(row.get("created_at")),
        updated_at: parse_timestamp(row.get("updated_at")),
        object_count: row.get("object_count"),
        total_size: row.get("total_size"),
    }
}

fn row_to_object(row: &sqlx::sqlite::SqliteRow) -> Result<Object> {
    let metadata_json: Option<String> = row.get("metadata");
    let metadata = metadata_json
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?;

    Ok(Object {
        id: row.get("id"),
        bucket_id: row.get("bucket_id"),
        key: row.get("key"),
        hash: row.get("hash"),
        size: row.get("size"),
        content_type: row.get("content_type"),
        metadata,
        created_at: parse_timestamp(row.get("created_at")),
        updated_at: parse_timestamp(row.get("updated_at")),
    })
}

fn parse_timestamp(raw: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
