use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::TokenStore;
use crate::blobstore::BlobStore;
use crate::config::Config;

use super::batch::handle_batch;
use super::transfer::{handle_download, handle_upload, handle_verify};

/// Shared state handed to every handler. The access oracle is consulted only
/// by the Authenticator CLI (via `TokenStore::revalidate`), never directly by
/// HTTP handlers, which authorize purely against the token's cached
/// privilege set — so it has no place here.
pub struct AppState {
    pub blob_store: Arc<BlobStore>,
    pub token_store: Arc<TokenStore>,
    pub config: Arc<Config>,
}

async fn health() -> &'static str {
    "OK"
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/{namespace}/{repo}/info/lfs/objects/batch",
            post(handle_batch),
        )
        .route(
            "/{namespace}/{repo}/info/lfs/objects/upload",
            put(handle_upload),
        )
        .route(
            "/{namespace}/{repo}/info/lfs/objects/download",
            get(handle_download),
        )
        .route(
            "/{namespace}/{repo}/info/lfs/objects/verify",
            post(handle_verify),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Overridden by `Config::public_base_url` when set; otherwise derived from
/// the incoming request's `Host` header and an `X-Forwarded-Proto` hint,
/// defaulting to `http` when neither a proxy header nor TLS context is
/// available to this process.
#[must_use]
pub fn base_url(config: &Config, headers: &HeaderMap) -> String {
    if let Some(url) = &config.public_base_url {
        return url.trim_end_matches('/').to_string();
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{scheme}://{host}")
}
