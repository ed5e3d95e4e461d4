//! Session cookie policy, parsing and construction.

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};
use cookie::{Cookie, SameSite};
use time::{Duration, OffsetDateTime};

/// How the middleware names and scopes the session cookie.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Cookie name. Default `"session"`.
    pub name: String,
    /// Default `"/"`.
    pub path: String,
    /// No `Domain` attribute unless set.
    pub domain: Option<String>,
    /// Send only over HTTPS. Off by default so local development works;
    /// turn it on in production.
    pub secure: bool,
    /// Hide the cookie from client-side script. Default on.
    pub http_only: bool,
    /// Default `Lax`.
    pub same_site: SameSite,
    /// Whether the cookie carries `Expires`/`Max-Age` and so survives
    /// browser restarts. Default on. When off, sessions that called
    /// `set_remember_me(true)` still persist.
    pub persist: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "session".to_owned(),
            path: "/".to_owned(),
            domain: None,
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
            persist: true,
        }
    }
}

impl CookieConfig {
    fn builder(&self, value: String) -> cookie::CookieBuilder<'static> {
        let mut builder = Cookie::build((self.name.clone(), value))
            .path(self.path.clone())
            .http_only(self.http_only)
            .secure(self.secure)
            .same_site(self.same_site);
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        builder
    }
}

/// Pull the session token out of the request's `Cookie` headers.
pub(crate) fn session_token(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(header::COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        for cookie in Cookie::split_parse(raw.to_owned()).flatten() {
            if cookie.name() == name {
                return Some(cookie.value().to_owned());
            }
        }
    }
    None
}

/// Issue (or refresh) the session cookie after a commit.
///
/// `Expires`/`Max-Age` are written only when `persist` is set, and round up
/// to the next whole second so the cookie never dies before the store row.
pub(crate) fn write_session_cookie(
    headers: &mut HeaderMap,
    config: &CookieConfig,
    token: &str,
    expiry: DateTime<Utc>,
    persist: bool,
) {
    let mut builder = config.builder(token.to_owned());

    if persist {
        if let Ok(expires) = OffsetDateTime::from_unix_timestamp(expiry.timestamp() + 1) {
            builder = builder.expires(expires);
        }
        let max_age = (expiry - Utc::now()).num_seconds() + 1;
        builder = builder.max_age(Duration::seconds(max_age.max(0)));
    }

    append_cookie(headers, builder.build());
}

/// Overwrite the session cookie with an already-expired one so the client
/// drops it.
pub(crate) fn write_removal_cookie(headers: &mut HeaderMap, config: &CookieConfig) {
    let cookie = config
        .builder(String::new())
        .expires(OffsetDateTime::UNIX_EPOCH)
        .max_age(Duration::ZERO)
        .build();
    append_cookie(headers, cookie);
}

fn append_cookie(headers: &mut HeaderMap, cookie: Cookie<'static>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
            headers.append(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache=\"Set-Cookie\""),
            );
        }
        // Tokens are base64url and names come from config; this only fires
        // on a misconfigured cookie name.
        Err(error) => tracing::error!(%error, "session cookie is not header-safe"),
    }
}
