//! The load-and-save middleware.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use clasp_core::{Error, Manager, SaveOutcome, Session};

use crate::cookies::{session_token, write_removal_cookie, write_session_cookie, CookieConfig};

type ErrorHandler = dyn Fn(&Error) -> Response + Send + Sync;

/// State for [`load_and_save`]: the manager plus cookie policy and the
/// response produced when the session layer itself fails.
#[derive(Clone)]
pub struct SessionMiddleware {
    manager: Manager,
    cookie: CookieConfig,
    on_error: Arc<ErrorHandler>,
}

impl SessionMiddleware {
    pub fn new(manager: Manager) -> Self {
        Self {
            manager,
            cookie: CookieConfig::default(),
            on_error: Arc::new(default_error_handler),
        }
    }

    pub fn with_cookie(mut self, cookie: CookieConfig) -> Self {
        self.cookie = cookie;
        self
    }

    /// Replace the default error response (log + plain 500) produced when a
    /// session load or save fails.
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error) -> Response + Send + Sync + 'static,
    {
        self.on_error = Arc::new(handler);
        self
    }
}

fn default_error_handler(error: &Error) -> Response {
    tracing::error!(%error, "session middleware failure");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// Load the session before the inner handler runs, save it after.
///
/// Attach once, above the routes that use sessions:
///
/// ```ignore
/// let mw = SessionMiddleware::new(manager);
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(axum::middleware::from_fn_with_state(mw, load_and_save));
/// ```
///
/// Handlers receive the session through `Extension<Session>`; axum rejects
/// the extraction with a 500 when the middleware is not installed. After the
/// handler returns, a modified session is committed and its cookie
/// (re)issued, a destroyed session gets an already-expired cookie, and an
/// untouched session writes nothing. `Vary: Cookie` is appended either way.
pub async fn load_and_save(
    State(mw): State<SessionMiddleware>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // A second copy of this layer further down the stack reuses the handle
    // loaded by the outermost one.
    if request.extensions().get::<Session>().is_some() {
        return next.run(request).await;
    }

    let token = session_token(request.headers(), &mw.cookie.name);
    let session = match mw.manager.load(token.as_deref()).await {
        Ok(session) => session,
        Err(error) => return (mw.on_error)(&error),
    };
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    match mw.manager.save(&session).await {
        Ok(SaveOutcome::Committed { token, expiry }) => {
            let persist = mw.cookie.persist || session.remember_me().await;
            write_session_cookie(response.headers_mut(), &mw.cookie, &token, expiry, persist);
        }
        Ok(SaveOutcome::Destroyed) => write_removal_cookie(response.headers_mut(), &mw.cookie),
        Ok(SaveOutcome::Unmodified) => {}
        Err(error) => return (mw.on_error)(&error),
    }

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Cookie"));
    response
}
