//! Persistence contract.
//!
//! A store is a token-keyed byte container with per-row expiry. It never
//! inspects the bytes; serialization belongs to the codec. Implementations
//! own their internal concurrency discipline and report failures verbatim,
//! leaving retry policy to the caller.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;

/// What a store can do beyond find/commit/delete.
///
/// The manager reads this once at construction and consults the cached copy,
/// so a store's answer must not change over its lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreCapabilities {
    /// Whether [`Store::all`] enumerates live sessions.
    pub iteration: bool,
}

/// Token-keyed session persistence.
#[async_trait]
pub trait Store: Send + Sync {
    /// Look up the bytes committed under `token`.
    ///
    /// A missing or expired row is `Ok(None)`, never an error.
    async fn find(&self, token: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Upsert `bytes` under `token`, expiring at `expiry`.
    async fn commit(
        &self,
        token: &str,
        bytes: &[u8],
        expiry: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Delete the row under `token`. Deleting an absent token is not an
    /// error.
    async fn delete(&self, token: &str) -> Result<(), StoreError>;

    /// Describe optional abilities. Defaults to none.
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::default()
    }

    /// Enumerate all live `(token, bytes)` pairs.
    ///
    /// Stores that report `iteration: false` keep this default, which fails
    /// explicitly rather than silently yielding nothing.
    async fn all(&self) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        Err(StoreError::IterationUnsupported)
    }
}
