//! Integration tests: a real router with the session layer attached, driven
//! in-process through `tower::ServiceExt::oneshot`.
//!
//! Covers the contract handlers rely on:
//! - a modified session gets a Set-Cookie with a 43-char token
//! - the token round-trips: a second request sees the stored values
//! - untouched sessions write no cookie but still get `Vary: Cookie`
//! - destroy answers with an already-expired cookie
//! - renewing mid-request rotates the cookie and retires the old token
//! - persist=false omits Expires/Max-Age unless remember-me is set
//! - stacking the layer twice only loads and saves once
//! - handlers without the layer installed get a 500, not a panic
//! - load/save failures turn into the error response (default 500 or a
//!   custom handler) and write no session headers

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use chrono::{DateTime, Utc};
use cookie::Cookie;
use tower::ServiceExt;

use clasp_axum::{load_and_save, CookieConfig, SessionMiddleware};
use clasp_core::{Manager, Session, Store, StoreError};

// ── Test double: store with switchable failures ─────────────────────────

struct BrokenStore {
    fail_find: bool,
    fail_commit: bool,
}

impl BrokenStore {
    fn failing_find() -> Self {
        Self {
            fail_find: true,
            fail_commit: false,
        }
    }

    fn failing_commit() -> Self {
        Self {
            fail_find: false,
            fail_commit: true,
        }
    }

    fn refused() -> StoreError {
        StoreError::backend(std::io::Error::new(
            std::io::ErrorKind::Other,
            "store refused",
        ))
    }
}

#[async_trait]
impl Store for BrokenStore {
    async fn find(&self, _token: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if self.fail_find {
            return Err(Self::refused());
        }
        Ok(None)
    }

    async fn commit(
        &self,
        _token: &str,
        _bytes: &[u8],
        _expiry: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.fail_commit {
            return Err(Self::refused());
        }
        Ok(())
    }

    async fn delete(&self, _token: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn put_name(Extension(session): Extension<Session>) -> &'static str {
    session.put("name", "alice").await;
    "stored"
}

async fn greet(Extension(session): Extension<Session>) -> String {
    format!("hello {}", session.get_string("name").await)
}

async fn remember(Extension(session): Extension<Session>) -> &'static str {
    session.put("name", "alice").await;
    session.set_remember_me(true).await;
    "remembered"
}

async fn logout(
    State(manager): State<Manager>,
    Extension(session): Extension<Session>,
) -> StatusCode {
    match manager.destroy(&session).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn renew(
    State(manager): State<Manager>,
    Extension(session): Extension<Session>,
) -> StatusCode {
    match manager.renew_token(&session).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn app_with(manager: Manager, cookie: CookieConfig) -> Router {
    let mw = SessionMiddleware::new(manager.clone()).with_cookie(cookie);
    Router::new()
        .route("/put", get(put_name))
        .route("/greet", get(greet))
        .route("/remember", get(remember))
        .route("/logout", get(logout))
        .route("/renew", get(renew))
        .layer(from_fn_with_state(mw, load_and_save))
        .with_state(manager)
}

fn app(manager: Manager) -> Router {
    app_with(manager, CookieConfig::default())
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn get_request(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

fn get_request_with_cookie(path: &str, token: &str) -> Request<Body> {
    Request::get(path)
        .header(header::COOKIE, format!("session={token}"))
        .body(Body::empty())
        .unwrap()
}

fn set_cookie(response: &axum::response::Response) -> Cookie<'static> {
    let raw = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("response should carry Set-Cookie")
        .to_str()
        .unwrap();
    Cookie::parse(raw.to_owned()).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn modified_session_issues_a_cookie_that_round_trips() {
    let app = app(Manager::new());

    let response = app.clone().oneshot(get_request("/put")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = set_cookie(&response);
    assert_eq!(cookie.name(), "session");
    assert_eq!(cookie.value().len(), 43);
    assert_eq!(response.headers().get(header::VARY).unwrap(), "Cookie");
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache=\"Set-Cookie\""
    );

    let token = cookie.value().to_owned();
    let response = app
        .oneshot(get_request_with_cookie("/greet", &token))
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "hello alice");
}

#[tokio::test]
async fn persistent_cookie_expires_with_the_session() {
    let app = app(Manager::new());

    let response = app.oneshot(get_request("/put")).await.unwrap();
    let cookie = set_cookie(&response);

    let max_age = cookie.max_age().expect("persistent cookie has Max-Age");
    assert!(max_age > time::Duration::hours(23));
    assert!(max_age <= time::Duration::hours(24) + time::Duration::seconds(2));
    assert!(cookie.expires_datetime().is_some());
}

#[tokio::test]
async fn untouched_session_writes_no_cookie_but_varies() {
    let app = app(Manager::new());

    let response = app.oneshot(get_request("/greet")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(response.headers().get(header::VARY).unwrap(), "Cookie");
}

#[tokio::test]
async fn unknown_token_starts_a_fresh_session() {
    let app = app(Manager::new());

    let response = app
        .oneshot(get_request_with_cookie(
            "/greet",
            "sJIbWcVUmit2UR4SCzvWAH6dRfLEAGKGzxLozNPMySM",
        ))
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "hello ");
}

#[tokio::test]
async fn destroy_sends_an_already_expired_cookie() {
    let app = app(Manager::new());

    let response = app.clone().oneshot(get_request("/put")).await.unwrap();
    let token = set_cookie(&response).value().to_owned();

    let response = app
        .clone()
        .oneshot(get_request_with_cookie("/logout", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let removal = set_cookie(&response);
    assert_eq!(removal.value(), "");
    assert_eq!(removal.max_age(), Some(time::Duration::ZERO));
    assert_eq!(
        removal.expires_datetime().map(|t| t.unix_timestamp()),
        Some(0)
    );

    // The old token is gone server-side too.
    let response = app
        .oneshot(get_request_with_cookie("/greet", &token))
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "hello ");
}

#[tokio::test]
async fn renew_rotates_the_cookie_and_retires_the_old_token() {
    let app = app(Manager::new());

    let response = app.clone().oneshot(get_request("/put")).await.unwrap();
    let old_token = set_cookie(&response).value().to_owned();

    let response = app
        .clone()
        .oneshot(get_request_with_cookie("/renew", &old_token))
        .await
        .unwrap();
    let new_token = set_cookie(&response).value().to_owned();
    assert_ne!(new_token, old_token);

    let response = app
        .clone()
        .oneshot(get_request_with_cookie("/greet", &new_token))
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "hello alice");

    let response = app
        .oneshot(get_request_with_cookie("/greet", &old_token))
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "hello ");
}

#[tokio::test]
async fn non_persistent_cookie_omits_expiry_unless_remembered() {
    let config = CookieConfig {
        persist: false,
        ..CookieConfig::default()
    };

    let app = app_with(Manager::new(), config.clone());
    let response = app.oneshot(get_request("/put")).await.unwrap();
    let cookie = set_cookie(&response);
    assert!(cookie.max_age().is_none());
    assert!(cookie.expires_datetime().is_none());

    let app = app_with(Manager::new(), config);
    let response = app.oneshot(get_request("/remember")).await.unwrap();
    let cookie = set_cookie(&response);
    assert!(cookie.max_age().is_some());
}

#[tokio::test]
async fn stacked_layers_load_once_and_write_one_cookie() {
    let manager = Manager::new();
    let mw = SessionMiddleware::new(manager.clone());

    let app = Router::new()
        .route("/put", get(put_name))
        .layer(from_fn_with_state(mw.clone(), load_and_save))
        .layer(from_fn_with_state(mw, load_and_save))
        .with_state(manager);

    let response = app.oneshot(get_request("/put")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get_all(header::SET_COOKIE).iter().count(),
        1
    );
    assert_eq!(response.headers().get_all(header::VARY).iter().count(), 1);
}

#[tokio::test]
async fn session_extraction_without_the_layer_is_a_500() {
    let app: Router = Router::new().route("/greet", get(greet));

    let response = app.oneshot(get_request("/greet")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn load_failure_answers_500_with_no_session_headers() {
    let manager = Manager::builder().store(BrokenStore::failing_find()).build();
    let app = app(manager);

    let response = app
        .oneshot(get_request_with_cookie(
            "/greet",
            "sJIbWcVUmit2UR4SCzvWAH6dRfLEAGKGzxLozNPMySM",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert!(response.headers().get(header::VARY).is_none());
}

#[tokio::test]
async fn save_failure_answers_500_with_no_session_headers() {
    let manager = Manager::builder()
        .store(BrokenStore::failing_commit())
        .build();
    let app = app(manager);

    // No cookie, so the load succeeds without the store; the commit after
    // the handler mutates is what fails.
    let response = app.oneshot(get_request("/put")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert!(response.headers().get(header::VARY).is_none());
}

#[tokio::test]
async fn custom_error_handler_shapes_the_failure_response() {
    let manager = Manager::builder().store(BrokenStore::failing_find()).build();
    let mw = SessionMiddleware::new(manager.clone()).with_error_handler(|_error| {
        (StatusCode::SERVICE_UNAVAILABLE, "session backend down").into_response()
    });
    let app = Router::new()
        .route("/greet", get(greet))
        .layer(from_fn_with_state(mw, load_and_save))
        .with_state(manager);

    let response = app
        .oneshot(get_request_with_cookie(
            "/greet",
            "sJIbWcVUmit2UR4SCzvWAH6dRfLEAGKGzxLozNPMySM",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_string(response).await, "session backend down");
}
