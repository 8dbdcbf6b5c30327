use super::{MappingStore, StoreError};
use anyhow::Context;
use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::PathBuf;
use std::time::Duration;

/// SQLite-backed store. Expiry is a millisecond timestamp column checked on
/// read; expired rows linger until [`MappingStore::purge_expired`] runs.
#[derive(Clone)]
pub struct SqliteMappingStore {
    db: SqlitePool,
}

impl SqliteMappingStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        ensure_db_file(database_url)?;
        // Every connection to an in-memory database sees its own database,
        // so those pools are pinned to a single long-lived connection.
        let options = if is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let db = options
            .connect(database_url)
            .await
            .with_context(|| format!("failed to open sqlite database {database_url}"))?;
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("failed to run sqlite migrations")?;
        Ok(Self { db })
    }
}

#[async_trait]
impl MappingStore for SqliteMappingStore {
    async fn get(&self, id: i64) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT conference FROM conference_mappings \
             WHERE id = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(id)
        .bind(now_millis())
        .fetch_optional(&self.db)
        .await?;
        Ok(value)
    }

    async fn set(&self, id: i64, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO conference_mappings (id, conference, expires_at) VALUES (?, ?, NULL) \
             ON CONFLICT(id) DO UPDATE SET conference = excluded.conference, expires_at = NULL",
        )
        .bind(id)
        .bind(value)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn expire(&self, id: i64, ttl: Duration) -> Result<bool, StoreError> {
        let now = now_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let result = sqlx::query(
            "UPDATE conference_mappings SET expires_at = ? \
             WHERE id = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(now.saturating_add(ttl_ms))
        .bind(id)
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM conference_mappings WHERE expires_at IS NOT NULL AND expires_at <= ?",
        )
        .bind(now_millis())
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    fn kind(&self) -> &'static str {
        "sqlite"
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains(":memory:")
}

fn ensure_db_file(database_url: &str) -> anyhow::Result<()> {
    if is_memory_url(database_url) {
        return Ok(());
    }
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"));
    let Some(path) = path else { return Ok(()) };
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() {
        return Ok(());
    }
    let db_path = PathBuf::from(path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    if !db_path.exists() {
        std::fs::File::create(&db_path)
            .with_context(|| format!("failed to create {}", db_path.display()))?;
    }
    Ok(())
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
