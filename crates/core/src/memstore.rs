//! In-memory store.
//!
//! The manager's default backend: a process-local map guarded by a
//! `parking_lot::RwLock`. Rows at or past their expiry are treated as misses
//! on read; reclaiming their memory is the caller's job via
//! [`MemoryStore::sweep_expired`] on whatever schedule suits the process.
//! The store spawns no tasks of its own.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::store::{Store, StoreCapabilities};

#[derive(Debug, Clone)]
struct Row {
    bytes: Vec<u8>,
    expiry: DateTime<Utc>,
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<String, Row>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired row and return how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|_, row| row.expiry > now);
        let swept = before - rows.len();
        if swept > 0 {
            tracing::debug!(swept, remaining = rows.len(), "swept expired sessions");
        }
        swept
    }

    /// Number of rows currently held, expired or not.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find(&self, token: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let rows = self.rows.read();
        Ok(rows
            .get(token)
            .filter(|row| row.expiry > Utc::now())
            .map(|row| row.bytes.clone()))
    }

    async fn commit(
        &self,
        token: &str,
        bytes: &[u8],
        expiry: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.write();
        rows.insert(
            token.to_owned(),
            Row {
                bytes: bytes.to_vec(),
                expiry,
            },
        );
        Ok(())
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        self.rows.write().remove(token);
        Ok(())
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities { iteration: true }
    }

    async fn all(&self) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        let now = Utc::now();
        let rows = self.rows.read();
        Ok(rows
            .iter()
            .filter(|(_, row)| row.expiry > now)
            .map(|(token, row)| (token.clone(), row.bytes.clone()))
            .collect())
    }
}
