//! Error types shared across all Clasp crates.

/// Boxed source for errors raised inside a store or codec implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error for session operations.
///
/// An unmodified session is not an error here: `Manager::save` reports it as
/// [`SaveOutcome::Unmodified`](crate::manager::SaveOutcome). Every variant of
/// this enum means the operation did not complete.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The system entropy source failed while minting a token. There is no
    /// fallback generator; the calling operation fails.
    #[error("token generation: {0}")]
    TokenGeneration(#[source] rand::Error),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("codec: {0}")]
    Codec(#[from] CodecError),
}

/// Error raised by a [`Store`](crate::store::Store) implementation.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Backend failure, surfaced verbatim. The manager never retries.
    #[error("backend: {0}")]
    Backend(#[source] BoxError),

    /// The store does not implement `all`, or the manager's capability
    /// descriptor says iteration is unavailable.
    #[error("store does not support iteration")]
    IterationUnsupported,

    /// A store call outran the manager's configured `store_timeout`.
    #[error("store call exceeded {0:?}")]
    Timeout(std::time::Duration),
}

impl StoreError {
    /// Wrap a backend error.
    pub fn backend(err: impl Into<BoxError>) -> Self {
        Self::Backend(err.into())
    }
}

/// Error raised by a [`Codec`](crate::codec::Codec) implementation.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("encode: {0}")]
    Encode(#[source] BoxError),

    #[error("decode: {0}")]
    Decode(#[source] BoxError),
}

impl CodecError {
    pub fn encode(err: impl Into<BoxError>) -> Self {
        Self::Encode(err.into())
    }

    pub fn decode(err: impl Into<BoxError>) -> Self {
        Self::Decode(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
