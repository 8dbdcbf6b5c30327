use super::{MappingStore, StoreError};
use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

/// Redis-backed store. Keys are the decimal conference ID with no prefix,
/// and expiry is delegated to Redis `EXPIRE`.
#[derive(Clone)]
pub struct RedisMappingStore {
    connection: ConnectionManager,
}

impl RedisMappingStore {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url).context("invalid REDIS_URL")?;
        let connection = ConnectionManager::new(client)
            .await
            .context("failed to connect to redis")?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl MappingStore for RedisMappingStore {
    async fn get(&self, id: i64) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = conn.get(id.to_string()).await?;
        Ok(value.map(stored_text))
    }

    async fn set(&self, id: i64, value: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.set(id.to_string(), value).await?;
        Ok(())
    }

    async fn expire(&self, id: i64, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let applied: bool = conn.expire(id.to_string(), seconds).await?;
        Ok(applied)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        Ok(0)
    }

    fn kind(&self) -> &'static str {
        "redis"
    }
}

/// Values written by other clients may not be UTF-8; they are passed on
/// lossily instead of failing the read.
fn stored_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(error) => {
            tracing::warn!(?error, "stored conference is not valid utf-8");
            String::from_utf8_lossy(error.as_bytes()).into_owned()
        }
    }
}
