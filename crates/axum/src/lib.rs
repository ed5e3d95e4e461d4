//! axum bindings for Clasp sessions.
//!
//! One middleware does the whole request-cycle dance: read the session
//! cookie, load the record, expose the handle through request extensions,
//! and translate the save outcome into `Set-Cookie` after the handler
//! finishes. Handlers just take `Extension<Session>`.

mod cookies;
mod middleware;

pub use cookie::SameSite;
pub use cookies::CookieConfig;
pub use middleware::{load_and_save, SessionMiddleware};
