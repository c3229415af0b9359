//! SQLite connection pools for the connection cache database.
//!
//! One writer connection serializes every cache mutation; a small
//! read-only pool serves lookups alongside it. WAL keeps readers from
//! blocking on the writer.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

const DATABASE_FILE: &str = "outreach.db";

/// Connection counts and lock wait for `DatabasePool::connect`.
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub readers: u32,
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            readers: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Writer and reader handles onto one cache database.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open `database_url` with default settings.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        Self::connect(database_url, PoolSettings::default()).await
    }

    /// Open the database, creating the file if needed, and bring the
    /// `kv_store` schema up to date before any reader connects.
    pub async fn connect(database_url: &str, settings: PoolSettings) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(settings.busy_timeout);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(settings.readers.max(1))
            .connect_with(options.read_only(true))
            .await?;

        tracing::debug!(readers = settings.readers, "cache database opened");
        Ok(Self { reader, writer })
    }
}

/// `sqlite://{data_dir}/outreach.db`
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}", data_dir.join(DATABASE_FILE).display())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_in(dir: &tempfile::TempDir) -> DatabasePool {
        DatabasePool::new(&database_url(dir.path())).await.unwrap()
    }

    #[tokio::test]
    async fn migrations_leave_only_the_cache_table() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_in(&dir).await;

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations'",
        )
        .fetch_all(&pool.reader)
        .await
        .unwrap();
        assert_eq!(tables, vec!["kv_store".to_string()]);
    }

    #[tokio::test]
    async fn writer_runs_in_wal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_in(&dir).await;

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool.writer)
            .await
            .unwrap();
        assert!(mode.eq_ignore_ascii_case("wal"));
    }

    #[tokio::test]
    async fn readers_see_writes_but_cannot_write() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_in(&dir).await;

        sqlx::query(
            "INSERT INTO kv_store (namespace, key, value, created_at, updated_at)
             VALUES ('u1', 'connections', '[]', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool.writer)
        .await
        .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_store WHERE namespace = 'u1'")
            .fetch_one(&pool.reader)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let denied = sqlx::query("DELETE FROM kv_store").execute(&pool.reader).await;
        assert!(denied.is_err());
    }

    #[tokio::test]
    async fn reopening_an_existing_database_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        drop(open_in(&dir).await);

        let settings = PoolSettings {
            readers: 1,
            ..PoolSettings::default()
        };
        DatabasePool::connect(&database_url(dir.path()), settings)
            .await
            .unwrap();
    }

    #[test]
    fn url_points_into_the_data_dir() {
        let url = database_url(Path::new("/tmp/outreach-data"));
        assert_eq!(url, "sqlite:///tmp/outreach-data/outreach.db");
    }
}
