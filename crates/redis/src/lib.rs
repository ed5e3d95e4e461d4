//! Redis-backed session store.
//!
//! Rows live under `<prefix><token>` with a per-row TTL, so Redis itself
//! retires expired sessions and `find` never has to check the clock. The
//! pool comes from `deadpool-redis`; hand the same pool to anything else in
//! the process that talks to Redis.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Pool, Runtime};

use clasp_core::{Store, StoreCapabilities, StoreError};

const DEFAULT_PREFIX: &str = "clasp:session:";

/// Session store on a Redis connection pool.
pub struct RedisStore {
    pool: Pool,
    prefix: String,
}

impl RedisStore {
    /// Store sessions through `pool` under the default `clasp:session:`
    /// prefix.
    pub fn new(pool: Pool) -> Self {
        Self::with_prefix(pool, DEFAULT_PREFIX)
    }

    /// Store sessions under a custom key prefix. Use distinct prefixes to
    /// run several independent session managers against one Redis.
    pub fn with_prefix(pool: Pool, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
        }
    }

    /// Build a store from a Redis URL (`redis://host:port/db`).
    pub fn from_url(url: impl Into<String>) -> Result<Self, StoreError> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(StoreError::backend)?;
        Ok(Self::new(pool))
    }

    fn key(&self, token: &str) -> String {
        format!("{}{}", self.prefix, token)
    }
}

/// Whole seconds from `now` to `expiry`, rounded up so a row never dies
/// before its expiry instant.
fn seconds_until(now: DateTime<Utc>, expiry: DateTime<Utc>) -> i64 {
    let millis = (expiry - now).num_milliseconds();
    (millis + 999).div_euclid(1000)
}

/// Escape Redis glob metacharacters so a prefix matches literally in
/// `KEYS`.
fn escape_glob(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl Store for RedisStore {
    async fn find(&self, token: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.pool.get().await.map_err(StoreError::backend)?;
        conn.get(self.key(token))
            .await
            .map_err(StoreError::backend)
    }

    async fn commit(
        &self,
        token: &str,
        bytes: &[u8],
        expiry: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let ttl = seconds_until(Utc::now(), expiry);
        if ttl <= 0 {
            // Already expired; an upsert would resurrect it.
            return self.delete(token).await;
        }

        let mut conn = self.pool.get().await.map_err(StoreError::backend)?;
        conn.set_ex::<_, _, ()>(self.key(token), bytes, ttl as u64)
            .await
            .map_err(StoreError::backend)
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(StoreError::backend)?;
        conn.del::<_, ()>(self.key(token))
            .await
            .map_err(StoreError::backend)
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities { iteration: true }
    }

    async fn all(&self) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        let mut conn = self.pool.get().await.map_err(StoreError::backend)?;

        let pattern = format!("{}*", escape_glob(&self.prefix));
        let keys: Vec<String> = conn.keys(pattern).await.map_err(StoreError::backend)?;
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let values: Vec<Option<Vec<u8>>> =
            conn.mget(&keys).await.map_err(StoreError::backend)?;

        let mut rows = HashMap::with_capacity(keys.len());
        for (key, bytes) in keys.into_iter().zip(values) {
            // A row can expire between KEYS and MGET; skip the gaps.
            if let Some(bytes) = bytes {
                let token = key.strip_prefix(&self.prefix).unwrap_or(&key).to_owned();
                rows.insert(token, bytes);
            }
        }
        tracing::debug!(sessions = rows.len(), "listed sessions from redis");
        Ok(rows)
    }
}
