use crate::store::MappingStore;
use std::sync::Arc;
use std::time::Duration;

/// Periodically deletes expired records from stores that keep them around
/// after their TTL.
pub fn spawn_sweeper(store: Arc<dyn MappingStore>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, store = store.kind(), "purged expired mappings"),
                Err(error) => tracing::warn!(?error, "expired mapping sweep failed"),
            }
        }
    })
}
