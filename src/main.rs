use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod mapper;
mod store;
mod sweeper;

use api::AppState;
use config::{MapperConfig, StoreKind};
use mapper::MappingService;
use store::{MappingStore, MemoryMappingStore, RedisMappingStore, SqliteMappingStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let config = MapperConfig::from_env()?;

  let store: Arc<dyn MappingStore> = match config.store {
    StoreKind::Redis => Arc::new(RedisMappingStore::connect(&config.redis_url).await?),
    StoreKind::Sqlite => Arc::new(SqliteMappingStore::connect(&config.database_url).await?),
    StoreKind::Memory => Arc::new(MemoryMappingStore::new()),
  };

  let mapper = MappingService::new(
    Arc::clone(&store),
    config.ttl,
    config.store_timeout,
    config.failure_policy,
  );
  mapper
    .ping()
    .await
    .with_context(|| format!("{} store is not reachable", store.kind()))?;
  tracing::info!(
    store = store.kind(),
    ttl_secs = config.ttl.as_secs(),
    failure_policy = ?config.failure_policy,
    "conference mapping store ready"
  );

  if let Some(interval) = config.sweep_interval {
    sweeper::spawn_sweeper(Arc::clone(&store), interval);
  }

  let app = api::router(Arc::new(AppState { mapper }));

  let address = format!("0.0.0.0:{}", config.port);
  tracing::info!("listening on {address}");

  let listener = tokio::net::TcpListener::bind(&address).await?;
  axum::serve(listener, app).await?;

  Ok(())
}
