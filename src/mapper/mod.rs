//! Conference name <-> numeric ID mapping.

mod derive;
mod encoding;

pub use self::derive::{derive_conference_id, normalize_conference};
pub use self::encoding::{decode_conference, encode_conference};

use crate::store::{MappingStore, StoreError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Raw request parameters, before any parsing.
#[derive(Debug, Clone, Default)]
pub struct MappingQuery {
    pub conference: Option<String>,
    pub id: Option<String>,
}

/// A well-formed request ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestedId {
    Key(i64),
    /// An integer outside the `i64` key space, kept as normalized decimal
    /// text. Nothing is ever stored under it.
    Oversized(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingOutcome {
    /// The name was stored under its derived ID. `conference` is the name as
    /// the caller sent it.
    Created { id: i64, conference: String },
    Found { id: i64, conference: String },
    NotFound { id: RequestedId },
    NoInput,
    StoreUnavailable { id: Option<i64> },
}

/// How store errors and timeouts are reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFailurePolicy {
    /// Report [`MappingOutcome::StoreUnavailable`].
    Explicit,
    /// Treat a failed read as a miss and a failed write as if no input had
    /// been given.
    Fallthrough,
}

impl StoreFailurePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "explicit" => Some(Self::Explicit),
            "fallthrough" => Some(Self::Fallthrough),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct MappingService {
    store: Arc<dyn MappingStore>,
    ttl: Duration,
    store_timeout: Duration,
    failure_policy: StoreFailurePolicy,
}

impl MappingService {
    pub fn new(
        store: Arc<dyn MappingStore>,
        ttl: Duration,
        store_timeout: Duration,
        failure_policy: StoreFailurePolicy,
    ) -> Self {
        Self {
            store,
            ttl,
            store_timeout,
            failure_policy,
        }
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.with_timeout(self.store.ping()).await
    }

    pub async fn resolve(&self, query: MappingQuery) -> MappingOutcome {
        match query.id.as_deref().and_then(parse_id) {
            Some(RequestedId::Key(id)) => return self.lookup(id).await,
            Some(id @ RequestedId::Oversized(_)) => return MappingOutcome::NotFound { id },
            None => {}
        }

        match query.conference {
            Some(conference) if !conference.is_empty() => self.register(conference).await,
            _ => MappingOutcome::NoInput,
        }
    }

    async fn lookup(&self, id: i64) -> MappingOutcome {
        match self.with_timeout(self.store.get(id)).await {
            Ok(Some(stored)) => MappingOutcome::Found {
                id,
                conference: decode_conference(&stored).into_owned(),
            },
            Ok(None) => MappingOutcome::NotFound {
                id: RequestedId::Key(id),
            },
            Err(error) => {
                tracing::warn!(?error, id, "conference lookup failed");
                match self.failure_policy {
                    StoreFailurePolicy::Explicit => MappingOutcome::StoreUnavailable { id: Some(id) },
                    StoreFailurePolicy::Fallthrough => MappingOutcome::NotFound {
                        id: RequestedId::Key(id),
                    },
                }
            }
        }
    }

    async fn register(&self, conference: String) -> MappingOutcome {
        let normalized = normalize_conference(&conference);
        let id = i64::from(derive_conference_id(&normalized));
        let encoded = encode_conference(&normalized);

        match self.store_record(id, &encoded).await {
            Ok(()) => MappingOutcome::Created { id, conference },
            Err(error) => {
                tracing::warn!(?error, id, "conference registration failed");
                match self.failure_policy {
                    StoreFailurePolicy::Explicit => MappingOutcome::StoreUnavailable { id: Some(id) },
                    StoreFailurePolicy::Fallthrough => MappingOutcome::NoInput,
                }
            }
        }
    }

    async fn store_record(&self, id: i64, encoded: &str) -> Result<(), StoreError> {
        self.with_timeout(self.store.set(id, encoded)).await?;
        if !self.with_timeout(self.store.expire(id, self.ttl)).await? {
            // The key vanished between SET and EXPIRE; rewrite it once.
            self.with_timeout(self.store.set(id, encoded)).await?;
            self.with_timeout(self.store.expire(id, self.ttl)).await?;
        }
        Ok(())
    }

    async fn with_timeout<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| StoreError::Timeout(self.store_timeout))?
    }
}

/// Parses a request ID the way callers have always been allowed to write
/// it: optional surrounding whitespace, an optional sign, and digits that
/// may be grouped with single underscores. Zero counts as no ID. Integers
/// too large for a store key are still IDs; they just never match.
pub fn parse_id(raw: &str) -> Option<RequestedId> {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.as_bytes().first()? {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
        || !digits.bytes().all(|byte| byte.is_ascii_digit() || byte == b'_')
    {
        return None;
    }
    let digits = digits.replace('_', "");
    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return None;
    }
    let decimal = if negative {
        format!("-{significant}")
    } else {
        significant.to_string()
    };
    match decimal.parse::<i64>() {
        Ok(id) => Some(RequestedId::Key(id)),
        Err(_) => Some(RequestedId::Oversized(decimal)),
    }
}
