//! Tenant-scoped key/value persistence
//!
//! All engine state (connections, publish history, OAuth states, sync
//! summaries) lives behind the [`KvStore`] trait as JSON documents under
//! tenant-scoped keys. The shipped implementation is a single SQLite table
//! over sqlx; a deployment may substitute any store that honors `take`
//! (read-and-delete in one step).

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

use crate::error::{Result, StoreError};

/// Minimal async key/value contract.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: &str) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Read a value and delete it in the same step.
    ///
    /// Single-use tokens (OAuth states) depend on this being atomic: two
    /// concurrent `take` calls for the same key must not both observe the
    /// value.
    async fn take(&self, key: &str) -> Result<Option<String>>;
}

/// SQLite-backed [`KvStore`].
#[derive(Clone)]
pub struct SqliteKv {
    pool: SqlitePool,
}

impl SqliteKv {
    /// Open (or create) the database at `db_path` and bootstrap the schema.
    pub async fn connect(db_path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::IoError)?;
        }

        // Forward slashes work for SQLite URLs on every platform; mode=rwc
        // creates the file on first use.
        let db_url = format!("sqlite://{}?mode=rwc", expanded.replace('\\', "/"));
        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(StoreError::SqlxError)?;

        Self::bootstrap(&pool).await?;
        Ok(Self { pool })
    }

    /// An isolated in-memory store, for tests and local experiments.
    pub async fn in_memory() -> Result<Self> {
        // A single connection keeps the shared :memory: database alive for
        // the lifetime of the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(StoreError::SqlxError)?;

        Self::bootstrap(&pool).await?;
        Ok(Self { pool })
    }

    async fn bootstrap(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl KvStore for SqliteKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(row.map(|r| r.0))
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let mut tx = self.pool.begin().await.map_err(StoreError::SqlxError)?;

        let row = sqlx::query_as::<_, (String,)>("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::SqlxError)?;

        if row.is_some() {
            sqlx::query("DELETE FROM kv WHERE key = ?")
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::SqlxError)?;
        }

        tx.commit().await.map_err(StoreError::SqlxError)?;
        Ok(row.map(|r| r.0))
    }
}
