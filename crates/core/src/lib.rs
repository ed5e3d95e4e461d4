//! Server-side session management for Clasp.
//!
//! A unique opaque token identifies each client; the mutable key/value
//! record behind it is loaded at the start of a request, mutated during
//! handling, and committed durably at the end. This crate is the core of
//! that cycle: token minting, the unmodified/modified/destroyed status
//! machine, expiry arithmetic (absolute lifetime vs. sliding idle window),
//! the [`Store`] and [`Codec`] contracts, and the [`Manager`] that drives
//! them. HTTP bindings live in `clasp-axum`; the Redis backend in
//! `clasp-redis`.

pub mod codec;
pub mod error;
pub mod manager;
pub mod memstore;
pub mod session;
pub mod store;
mod token;
pub mod value;

pub use codec::{Codec, JsonCodec};
pub use error::{BoxError, CodecError, Error, Result, StoreError};
pub use manager::{Manager, ManagerBuilder, SaveOutcome};
pub use memstore::MemoryStore;
pub use session::{Session, SessionOptions, Status};
pub use store::{Store, StoreCapabilities};
pub use value::Value;
