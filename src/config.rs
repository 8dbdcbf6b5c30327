use crate::mapper::{StoreFailurePolicy, DEFAULT_TTL};
use anyhow::{bail, Context};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Redis,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone)]
pub struct MapperConfig {
    pub port: u16,
    pub store: StoreKind,
    pub redis_url: String,
    pub database_url: String,
    pub ttl: Duration,
    pub store_timeout: Duration,
    pub failure_policy: StoreFailurePolicy,
    pub sweep_interval: Option<Duration>,
}

impl MapperConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match env::var("MAPPING_STORE") {
            Ok(value) => parse_store_kind(&value)?,
            Err(_) => StoreKind::Redis,
        };
        let failure_policy = match env::var("STORE_ERROR_RESPONSE") {
            Ok(value) => StoreFailurePolicy::parse(&value).with_context(|| {
                format!("STORE_ERROR_RESPONSE must be 'explicit' or 'fallthrough', got '{value}'")
            })?,
            Err(_) => StoreFailurePolicy::Explicit,
        };
        let ttl_days = parse_positive_env("MAPPING_TTL_DAYS")?;
        let store_timeout_ms = parse_positive_env("STORE_TIMEOUT_MS")?;

        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(8001),
            store,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| default_database_url()),
            ttl: ttl_days
                .map(|days| Duration::from_secs(days.saturating_mul(24 * 60 * 60)))
                .unwrap_or(DEFAULT_TTL),
            store_timeout: Duration::from_millis(store_timeout_ms.unwrap_or(2000)),
            failure_policy,
            sweep_interval: match env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(3600)
            {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        })
    }
}

fn default_database_url() -> String {
    let base = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let default_path = base.join("data").join("conference-mapper.db");
    format!("sqlite://{}", default_path.display())
}

fn parse_store_kind(value: &str) -> anyhow::Result<StoreKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "redis" => Ok(StoreKind::Redis),
        "sqlite" => Ok(StoreKind::Sqlite),
        "memory" => Ok(StoreKind::Memory),
        other => bail!("MAPPING_STORE must be one of redis, sqlite, memory; got '{other}'"),
    }
}

fn parse_positive_env(var_name: &str) -> anyhow::Result<Option<u64>> {
    let Ok(raw) = env::var(var_name) else {
        return Ok(None);
    };
    parse_positive(var_name, &raw).map(Some)
}

fn parse_positive(var_name: &str, raw: &str) -> anyhow::Result<u64> {
    let value = raw
        .trim()
        .parse::<u64>()
        .with_context(|| format!("{var_name} has invalid value '{raw}'"))?;
    if value == 0 {
        bail!("{var_name} must be greater than zero");
    }
    Ok(value)
}
