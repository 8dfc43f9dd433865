use axum::http::HeaderMap;
use base64::Engine;

use crate::auth::TokenStore;
use crate::error::{Error, Result};
use crate::types::Token;

/// Parses the `Authorization: Basic <base64(user:password)>` header and loads
/// the matching token. Every batch and transfer request re-runs this; there
/// is no session state beyond the token file itself.
pub async fn authenticate(headers: &HeaderMap, token_store: &TokenStore) -> Result<Token> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(Error::MissingCredentials)?;

    let encoded = raw.strip_prefix("Basic ").ok_or(Error::MissingCredentials)?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| Error::MissingCredentials)?;
    let decoded = String::from_utf8(decoded).map_err(|_| Error::MissingCredentials)?;
    let (user, password) = decoded.split_once(':').ok_or(Error::MissingCredentials)?;

    token_store.load(user, password).await
}
