//! Session records and the handle that guards them.
//!
//! A record is the unit of session state: an optional token, an absolute
//! deadline, a status, and the key/value mapping. Handlers never touch the
//! record directly; they hold a cheap-clone [`Session`] handle whose async
//! mutex serializes every access. The mutex is async because the manager
//! holds it across store calls during commit, destroy, renew and merge.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::value::Value;

/// Key under which the remember-me flag is stored.
pub(crate) const REMEMBER_ME_KEY: &str = "__rememberMe";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where a record sits in its load-mutate-persist cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Loaded (or freshly created) and untouched since. Saving it is a no-op.
    Unmodified,
    /// At least one mutation since load. Saving commits it to the store.
    Modified,
    /// Destroyed this cycle. The record contents have already been reset to a
    /// fresh anonymous session; the first mutation moves it back to
    /// `Modified`.
    Destroyed,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
pub(crate) struct Record {
    /// `None` until the first successful commit mints a token.
    pub(crate) token: Option<String>,
    pub(crate) deadline: DateTime<Utc>,
    pub(crate) status: Status,
    pub(crate) values: HashMap<String, Value>,
}

impl Record {
    /// A brand-new anonymous record expiring `lifetime` from now.
    pub(crate) fn fresh(lifetime: Duration) -> Self {
        Self {
            token: None,
            deadline: Utc::now() + lifetime,
            status: Status::Unmodified,
            values: HashMap::new(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Options
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-call overrides for operations that (re)initialize a record.
///
/// Accepted by `load_with`, `destroy_with` and `renew_token_with`. An
/// explicit deadline takes precedence over a lifetime when both are set.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    lifetime: Option<Duration>,
    deadline: Option<DateTime<Utc>>,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the manager lifetime for this record only.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    /// Pin the record's deadline to an absolute instant.
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub(crate) fn apply(&self, record: &mut Record) {
        if let Some(lifetime) = self.lifetime {
            record.deadline = Utc::now() + lifetime;
        }
        if let Some(deadline) = self.deadline {
            record.deadline = deadline;
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Handle to one session record.
///
/// Clones share the same record; hand a clone to each concurrent sub-task of
/// a request and mutations stay serialized. Obtain one from
/// [`Manager::load`](crate::manager::Manager::load); persistence goes back
/// through the manager.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) record: Arc<Mutex<Record>>,
}

impl Session {
    pub(crate) fn from_record(record: Record) -> Self {
        Self {
            record: Arc::new(Mutex::new(record)),
        }
    }

    /// Store `value` under `key`, replacing any previous value.
    pub async fn put(&self, key: impl Into<String>, value: impl Into<Value>) {
        let mut record = self.record.lock().await;
        record.values.insert(key.into(), value.into());
        record.status = Status::Modified;
    }

    /// Fetch a copy of the value under `key`.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.record.lock().await.values.get(key).cloned()
    }

    /// Remove and return the value under `key`. The record is marked modified
    /// only when the key existed.
    pub async fn pop(&self, key: &str) -> Option<Value> {
        let mut record = self.record.lock().await;
        let value = record.values.remove(key);
        if value.is_some() {
            record.status = Status::Modified;
        }
        value
    }

    /// Remove the value under `key`, if any.
    pub async fn remove(&self, key: &str) {
        let mut record = self.record.lock().await;
        if record.values.remove(key).is_some() {
            record.status = Status::Modified;
        }
    }

    /// Remove every value. An already-empty record stays unmodified.
    pub async fn clear(&self) {
        let mut record = self.record.lock().await;
        if !record.values.is_empty() {
            record.values.clear();
            record.status = Status::Modified;
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.record.lock().await.values.contains_key(key)
    }

    /// All keys, sorted alphabetically.
    pub async fn keys(&self) -> Vec<String> {
        let record = self.record.lock().await;
        let mut keys: Vec<String> = record.values.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn status(&self) -> Status {
        self.record.lock().await.status
    }

    /// The committed token, or `None` if this record has never been
    /// committed.
    pub async fn token(&self) -> Option<String> {
        self.record.lock().await.token.clone()
    }

    pub async fn deadline(&self) -> DateTime<Utc> {
        self.record.lock().await.deadline
    }

    /// Move the absolute deadline to `deadline` and mark the record
    /// modified.
    pub async fn expire(&self, deadline: DateTime<Utc>) {
        let mut record = self.record.lock().await;
        record.deadline = deadline;
        record.status = Status::Modified;
    }

    /// Ask the HTTP layer to persist this session's cookie across browser
    /// restarts even when the cookie is configured non-persistent.
    pub async fn set_remember_me(&self, remember: bool) {
        self.put(REMEMBER_ME_KEY, remember).await;
    }

    pub async fn remember_me(&self) -> bool {
        self.get_bool(REMEMBER_ME_KEY).await
    }

    // ──────────────────────────────────────────────────────────────
    // Typed convenience accessors
    // ──────────────────────────────────────────────────────────────
    // Lenient by design: an absent key or a value of a different variant
    // yields the type's default with no distinguishable error. Use `get` /
    // `pop` plus `Value::as_*` when the distinction matters.

    pub async fn get_string(&self, key: &str) -> String {
        self.get(key).await.and_then(Value::into_string).unwrap_or_default()
    }

    pub async fn get_bool(&self, key: &str) -> bool {
        self.get(key).await.and_then(|v| v.as_bool()).unwrap_or_default()
    }

    pub async fn get_i32(&self, key: &str) -> i32 {
        self.get(key).await.and_then(|v| v.as_i32()).unwrap_or_default()
    }

    pub async fn get_i64(&self, key: &str) -> i64 {
        self.get(key).await.and_then(|v| v.as_i64()).unwrap_or_default()
    }

    pub async fn get_f64(&self, key: &str) -> f64 {
        self.get(key).await.and_then(|v| v.as_f64()).unwrap_or_default()
    }

    pub async fn get_bytes(&self, key: &str) -> Vec<u8> {
        self.get(key).await.and_then(Value::into_bytes).unwrap_or_default()
    }

    pub async fn get_time(&self, key: &str) -> DateTime<Utc> {
        self.get(key).await.and_then(|v| v.as_time()).unwrap_or_default()
    }

    // The pop variants remove the key (marking the record modified) whenever
    // it exists, even if the stored variant does not match.

    pub async fn pop_string(&self, key: &str) -> String {
        self.pop(key).await.and_then(Value::into_string).unwrap_or_default()
    }

    pub async fn pop_bool(&self, key: &str) -> bool {
        self.pop(key).await.and_then(|v| v.as_bool()).unwrap_or_default()
    }

    pub async fn pop_i32(&self, key: &str) -> i32 {
        self.pop(key).await.and_then(|v| v.as_i32()).unwrap_or_default()
    }

    pub async fn pop_i64(&self, key: &str) -> i64 {
        self.pop(key).await.and_then(|v| v.as_i64()).unwrap_or_default()
    }

    pub async fn pop_f64(&self, key: &str) -> f64 {
        self.pop(key).await.and_then(|v| v.as_f64()).unwrap_or_default()
    }

    pub async fn pop_bytes(&self, key: &str) -> Vec<u8> {
        self.pop(key).await.and_then(Value::into_bytes).unwrap_or_default()
    }

    pub async fn pop_time(&self, key: &str) -> DateTime<Utc> {
        self.pop(key).await.and_then(|v| v.as_time()).unwrap_or_default()
    }
}
