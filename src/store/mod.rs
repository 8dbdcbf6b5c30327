//! Backing stores for conference mapping records.
//!
//! A store only persists `id -> encoded conference` pairs and enforces
//! their expiry. Encoding, decoding and ID derivation live in
//! [`crate::mapper`].

mod memory;
mod redis_store;
mod sqlite;

pub use self::memory::MemoryMappingStore;
pub use self::redis_store::RedisMappingStore;
pub use self::sqlite::SqliteMappingStore;

use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
}

/// Key-value store with per-key expiry.
///
/// Keys are conference IDs. Values are stored exactly as given; adapters
/// never decode them.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Returns the stored value, or `None` when the key is absent or expired.
    async fn get(&self, id: i64) -> Result<Option<String>, StoreError>;

    /// Upserts the value. Any expiry previously set on the key is cleared.
    async fn set(&self, id: i64, value: &str) -> Result<(), StoreError>;

    /// Expires the key after `ttl`. Returns `false` if the key does not exist.
    async fn expire(&self, id: i64, ttl: Duration) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Deletes records whose expiry has passed and returns how many were
    /// removed. Stores that expire keys on their own return `0`.
    async fn purge_expired(&self) -> Result<u64, StoreError>;

    fn kind(&self) -> &'static str;
}
