//! SQLite key-value store implementation.
//!
//! Implements `KvStore` from `outreach-core` using sqlx with split read/write
//! pools. Values are stored as JSON text and deserialized on read.

use chrono::{DateTime, Utc};
use outreach_core::storage::kv_store::KvStore;
use outreach_types::error::RepositoryError;
use outreach_types::storage::KvEntry;
use sqlx::Row;

use super::pool::DatabasePool;

/// Durable `KvStore`: the connection cache and its dirty flag live here.
pub struct SqliteKvStore {
    pool: DatabasePool,
}

impl SqliteKvStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct KvRow {
    namespace: String,
    key: String,
    value: String,
    created_at: String,
    updated_at: String,
}

impl KvRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            namespace: row.try_get("namespace")?,
            key: row.try_get("key")?,
            value: row.try_get("value")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_entry(self) -> Result<KvEntry, RepositoryError> {
        Ok(KvEntry {
            value: parse_value(&self.value)?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            namespace: self.namespace,
            key: self.key,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_value(s: &str) -> Result<serde_json::Value, RepositoryError> {
    serde_json::from_str(s)
        .map_err(|e| RepositoryError::Serialization(format!("invalid JSON value: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// KvStore implementation
// ---------------------------------------------------------------------------

impl KvStore for SqliteKvStore {
    async fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE namespace = ? AND key = ?")
            .bind(namespace)
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let value_str: String = row.try_get("value").map_err(query_err)?;
                Ok(Some(parse_value(&value_str)?))
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let value_str = serde_json::to_string(value)
            .map_err(|e| RepositoryError::Serialization(format!("failed to serialize value: {e}")))?;

        sqlx::query(
            r#"INSERT INTO kv_store (namespace, key, value, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT (namespace, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(namespace)
        .bind(key)
        .bind(&value_str)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        tracing::trace!(namespace, key, bytes = value_str.len(), "kv entry written");
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM kv_store WHERE namespace = ? AND key = ?")
            .bind(namespace)
            .bind(key)
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        Ok(())
    }

    async fn list_keys(&self, namespace: &str) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query("SELECT key FROM kv_store WHERE namespace = ? ORDER BY key")
            .bind(namespace)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("key").map_err(query_err))
            .collect()
    }

    async fn get_entry(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<KvEntry>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM kv_store WHERE namespace = ? AND key = ?")
            .bind(namespace)
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let kv_row = KvRow::from_row(&row).map_err(query_err)?;
                Ok(Some(kv_row.into_entry()?))
            }
            None => Ok(None),
        }
    }
}
