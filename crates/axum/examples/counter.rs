//! Minimal session-backed visit counter.
//!
//! Run with `cargo run -p clasp-axum --example counter`, then hit
//! http://127.0.0.1:3000/ a few times and watch the count climb. Delete the
//! `session` cookie to start over.

use axum::extract::Extension;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use clasp_axum::{load_and_save, SessionMiddleware};
use clasp_core::{Manager, Session};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,clasp_core=debug"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let manager = Manager::new();
    let mw = SessionMiddleware::new(manager);

    let app = Router::new()
        .route("/", get(count))
        .layer(from_fn_with_state(mw, load_and_save));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!(addr = %listener.local_addr()?, "counter demo listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn count(Extension(session): Extension<Session>) -> String {
    let count = session.get_i64("count").await + 1;
    session.put("count", count).await;
    format!("you have visited {count} time(s) this session\n")
}
