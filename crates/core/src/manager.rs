//! Session orchestration.
//!
//! The manager owns session policy (absolute lifetime, sliding idle timeout)
//! and the two collaborators (store, codec), and drives every record through
//! its load-mutate-persist cycle. Construction fixes the configuration; one
//! manager serves the whole process and clones share the same collaborators.
//!
//! Commit, destroy, renew and the merge delete all hold the record's mutex
//! across the store await. That is deliberate: two concurrent commits of the
//! same record must not mint different tokens. A hung store call therefore
//! blocks that record; set `store_timeout` to bound it.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::codec::{Codec, JsonCodec};
use crate::error::{Error, Result, StoreError};
use crate::memstore::MemoryStore;
use crate::session::{Record, Session, SessionOptions, Status};
use crate::store::{Store, StoreCapabilities};
use crate::token;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Save outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What [`Manager::save`] did with a record.
///
/// An unmodified record is an ordinary outcome here, not an error: callers
/// match on the variant instead of inspecting a sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The record was committed under `token`, durable until `expiry`. The
    /// HTTP layer should (re)issue the session cookie.
    Committed {
        token: String,
        expiry: DateTime<Utc>,
    },
    /// The record was destroyed this cycle; its row is already gone. The
    /// HTTP layer should expire the session cookie.
    Destroyed,
    /// Nothing changed since load; nothing was persisted.
    Unmodified,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Builder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configures a [`Manager`]. Obtained from [`Manager::builder`].
pub struct ManagerBuilder {
    lifetime: Duration,
    idle_timeout: Option<Duration>,
    store: Option<Arc<dyn Store>>,
    codec: Option<Arc<dyn Codec>>,
    store_timeout: Option<std::time::Duration>,
}

impl ManagerBuilder {
    fn new() -> Self {
        Self {
            lifetime: Duration::hours(24),
            idle_timeout: None,
            store: None,
            codec: None,
            store_timeout: None,
        }
    }

    /// Absolute lifetime for new records. Default 24 hours.
    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Sliding idle window. Disabled by default; non-positive values keep it
    /// disabled.
    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout);
        self
    }

    /// Persistence backend. Default [`MemoryStore`].
    pub fn store<S: Store + 'static>(self, store: S) -> Self {
        self.shared_store(Arc::new(store))
    }

    /// Persistence backend the caller keeps a handle to (for example a
    /// [`MemoryStore`] it periodically sweeps).
    pub fn shared_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Record serialization. Default [`JsonCodec`].
    pub fn codec<C: Codec + 'static>(mut self, codec: C) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// Upper bound on every store call. Unbounded by default.
    pub fn store_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.store_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Manager {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn Store>);
        let codec = self
            .codec
            .unwrap_or_else(|| Arc::new(JsonCodec) as Arc<dyn Codec>);
        // Probed once; stores must answer consistently for their lifetime.
        let capabilities = store.capabilities();

        Manager {
            lifetime: self.lifetime,
            idle_timeout: self.idle_timeout.filter(|idle| *idle > Duration::zero()),
            store,
            codec,
            store_timeout: self.store_timeout,
            capabilities,
        }
    }
}

impl Default for ManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Manager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Loads, persists and retires session records.
#[derive(Clone)]
pub struct Manager {
    lifetime: Duration,
    idle_timeout: Option<Duration>,
    store: Arc<dyn Store>,
    codec: Arc<dyn Codec>,
    store_timeout: Option<std::time::Duration>,
    capabilities: StoreCapabilities,
}

impl Manager {
    /// A manager with the default configuration: 24 hour lifetime, no idle
    /// timeout, in-memory store, JSON codec.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }

    /// The absolute lifetime given to new records.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Load the record behind `token`, or start a fresh anonymous one.
    ///
    /// `None`, an empty string, and a token the store no longer knows all
    /// yield a fresh record. Store and codec failures propagate; there is no
    /// silent fallback to an empty session for a row that exists but cannot
    /// be read.
    pub async fn load(&self, token: Option<&str>) -> Result<Session> {
        self.load_with(token, SessionOptions::default()).await
    }

    /// [`load`](Self::load) with per-record overrides, applied only when the
    /// record is created fresh.
    pub async fn load_with(&self, token: Option<&str>, options: SessionOptions) -> Result<Session> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(self.fresh_session(&options));
        };

        let Some(bytes) = self.bounded(self.store.find(token)).await? else {
            tracing::debug!("token unknown to store, starting fresh");
            return Ok(self.fresh_session(&options));
        };

        let (deadline, values) = self.codec.decode(&bytes)?;

        // Under a sliding idle window every load must re-commit the record,
        // otherwise the window never moves.
        let status = if self.idle_timeout.is_some() {
            Status::Modified
        } else {
            Status::Unmodified
        };

        Ok(Session::from_record(Record {
            token: Some(token.to_owned()),
            deadline,
            status,
            values,
        }))
    }

    /// Persist the record according to its status.
    pub async fn save(&self, session: &Session) -> Result<SaveOutcome> {
        match session.status().await {
            Status::Modified => {
                let (token, expiry) = self.commit(session).await?;
                Ok(SaveOutcome::Committed { token, expiry })
            }
            Status::Destroyed => Ok(SaveOutcome::Destroyed),
            Status::Unmodified => Ok(SaveOutcome::Unmodified),
        }
    }

    /// Commit the record unconditionally, minting a token on first commit.
    ///
    /// Returns the token and the row's expiry: the deadline, or `now + idle`
    /// when the idle window is the nearer of the two. Most callers want
    /// [`save`](Self::save); commit exists for flows that persist regardless
    /// of status.
    pub async fn commit(&self, session: &Session) -> Result<(String, DateTime<Utc>)> {
        let mut record = session.record.lock().await;

        let token = match &record.token {
            Some(token) => token.clone(),
            None => {
                let minted = token::generate()?;
                // The token survives a failed store call below: a retried
                // commit reuses it rather than minting a second one.
                record.token = Some(minted.clone());
                minted
            }
        };

        let bytes = self.codec.encode(record.deadline, &record.values)?;

        let mut expiry = record.deadline;
        if let Some(idle) = self.idle_timeout {
            expiry = expiry.min(Utc::now() + idle);
        }

        self.bounded(self.store.commit(&token, &bytes, expiry))
            .await?;
        tracing::debug!(expiry = %expiry, "session committed");
        Ok((token, expiry))
    }

    /// Delete the record's row and reset it to a fresh anonymous session.
    ///
    /// The status is left at `Destroyed` so a following [`save`](Self::save)
    /// retires the cookie; mutating the reset record moves it back to
    /// `Modified` and a later save commits it as a brand-new session.
    pub async fn destroy(&self, session: &Session) -> Result<()> {
        self.destroy_with(session, SessionOptions::default()).await
    }

    pub async fn destroy_with(&self, session: &Session, options: SessionOptions) -> Result<()> {
        let mut record = session.record.lock().await;

        // Delete first. If the store refuses, the record is left untouched
        // and the caller may retry. A never-committed record has no row.
        if let Some(token) = record.token.clone() {
            self.bounded(self.store.delete(&token)).await?;
        }

        record.status = Status::Destroyed;
        record.token = None;
        record.deadline = Utc::now() + self.lifetime;
        options.apply(&mut record);
        record.values.clear();
        tracing::debug!("session destroyed");
        Ok(())
    }

    /// Swap the record's token for a fresh one, keeping its values.
    ///
    /// Call before any privilege change (login, role escalation) so a token
    /// captured beforehand stops working. The old row is deleted before the
    /// new token exists anywhere; if the delete fails the old association
    /// stays intact and the operation reports the failure. A minting failure
    /// after a successful delete leaves the record holding the old token
    /// with no durable row behind it, an inherent boundary of running
    /// against a non-transactional store.
    pub async fn renew_token(&self, session: &Session) -> Result<()> {
        self.renew_token_with(session, SessionOptions::default())
            .await
    }

    pub async fn renew_token_with(
        &self,
        session: &Session,
        options: SessionOptions,
    ) -> Result<()> {
        let mut record = session.record.lock().await;

        if let Some(old) = record.token.clone() {
            self.bounded(self.store.delete(&old)).await?;
        }

        record.token = Some(token::generate()?);
        record.deadline = Utc::now() + self.lifetime;
        options.apply(&mut record);
        record.status = Status::Modified;
        tracing::debug!("session token renewed");
        Ok(())
    }

    /// Fold the record stored under `foreign_token` into `session`.
    ///
    /// Used when two flows of one user must converge (an email verification
    /// link opened in another browser, for example). An unknown foreign
    /// token is a silent no-op, as is merging a session into itself. On key
    /// collision the foreign value wins; the merged deadline is whichever of
    /// the two lies further out. The foreign row is deleted once its values
    /// are absorbed, so the merge consumes it; if that delete fails the
    /// in-memory merge has still happened.
    pub async fn merge_session(&self, session: &Session, foreign_token: &str) -> Result<()> {
        let Some(bytes) = self.bounded(self.store.find(foreign_token)).await? else {
            return Ok(());
        };

        let mut record = session.record.lock().await;
        if record.token.as_deref() == Some(foreign_token) {
            return Ok(());
        }

        let (foreign_deadline, foreign_values) = self.codec.decode(&bytes)?;

        // Merging never shortens validity.
        if foreign_deadline > record.deadline {
            record.deadline = foreign_deadline;
        }

        let absorbed = foreign_values.len();
        for (key, value) in foreign_values {
            record.values.insert(key, value);
        }
        record.status = Status::Modified;

        self.bounded(self.store.delete(foreign_token)).await?;
        tracing::debug!(absorbed, "foreign session merged");
        Ok(())
    }

    /// Visit every live session in the store.
    ///
    /// Each row decodes into its own transient [`Session`] handle; mutations
    /// die with the handle unless the callback commits them. Fails fast: the
    /// first store, decode or callback error aborts the remainder. Stores
    /// without iteration support fail immediately with
    /// [`StoreError::IterationUnsupported`].
    pub async fn iterate<F, Fut, E>(&self, mut visit: F) -> std::result::Result<(), E>
    where
        F: FnMut(Session) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
        E: From<Error>,
    {
        if !self.capabilities.iteration {
            return Err(E::from(Error::Store(StoreError::IterationUnsupported)));
        }

        let rows = self
            .bounded(self.store.all())
            .await
            .map_err(|e| E::from(Error::Store(e)))?;
        tracing::debug!(sessions = rows.len(), "iterating sessions");

        for (token, bytes) in rows {
            let (deadline, values) = self
                .codec
                .decode(&bytes)
                .map_err(|e| E::from(Error::Codec(e)))?;
            let session = Session::from_record(Record {
                token: Some(token),
                deadline,
                status: Status::Unmodified,
                values,
            });
            visit(session).await?;
        }
        Ok(())
    }

    fn fresh_session(&self, options: &SessionOptions) -> Session {
        let mut record = Record::fresh(self.lifetime);
        options.apply(&mut record);
        Session::from_record(record)
    }

    /// Run a store call under the configured timeout, if any.
    async fn bounded<T, F>(&self, call: F) -> std::result::Result<T, StoreError>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        match self.store_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout(limit)),
            },
            None => call.await,
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
