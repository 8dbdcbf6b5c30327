use super::{MappingStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct MemoryRecord {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryRecord {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local store for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryMappingStore {
    records: DashMap<i64, MemoryRecord>,
}

impl MemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn raw_value(&self, id: i64) -> Option<String> {
        self.records.get(&id).map(|record| record.value.clone())
    }
}

#[async_trait]
impl MappingStore for MemoryMappingStore {
    async fn get(&self, id: i64) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let removed = self.records.remove_if(&id, |_, record| record.is_expired(now));
        if removed.is_some() {
            return Ok(None);
        }
        Ok(self.records.get(&id).map(|record| record.value.clone()))
    }

    async fn set(&self, id: i64, value: &str) -> Result<(), StoreError> {
        self.records.insert(
            id,
            MemoryRecord {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn expire(&self, id: i64, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.records.get_mut(&id) {
            Some(mut record) if !record.is_expired(now) => {
                record.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = Instant::now();
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        Ok(before.saturating_sub(self.records.len()) as u64)
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
