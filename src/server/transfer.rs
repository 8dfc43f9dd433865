use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use serde::Deserialize;

use crate::error::Error;
use crate::types::{canonical_repo_name, Action, Oid};

use super::authn::authenticate;
use super::dto::VerifyRequest;
use super::error_response::ApiError;
use super::router::AppState;

#[derive(Debug, Deserialize)]
pub struct ObjectQuery {
    oid: String,
    #[allow(dead_code)]
    size: Option<u64>,
}

/// `PUT /<namespace>/<repo>/info/lfs/objects/upload?oid=&size=`.
pub async fn handle_upload(
    State(state): State<Arc<AppState>>,
    Path((namespace, repo_name)): Path<(String, String)>,
    Query(query): Query<ObjectQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    let repo = canonical_repo_name(&format!("{namespace}/{repo_name}"));
    let scoped = state.blob_store.scope(&repo)?;
    let token = authenticate(&headers, &state.token_store).await?;

    if !token.privileges.has(&repo, Action::Upload) {
        return Err(ApiError::privilege_denied(Action::Upload));
    }

    let oid = Oid::parse(&query.oid).map_err(ApiError::from)?;

    let mut writer = scoped.open_write(&oid).await?;
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::Internal(e.to_string()))?;
        writer.write_chunk(&chunk).await?;
    }
    writer.commit().await?;

    Ok(StatusCode::OK.into_response())
}

/// `GET /<namespace>/<repo>/info/lfs/objects/download?oid=&size=`.
pub async fn handle_download(
    State(state): State<Arc<AppState>>,
    Path((namespace, repo_name)): Path<(String, String)>,
    Query(query): Query<ObjectQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let repo = canonical_repo_name(&format!("{namespace}/{repo_name}"));
    let scoped = state.blob_store.scope(&repo)?;
    let token = authenticate(&headers, &state.token_store).await?;

    if !token.privileges.has(&repo, Action::Download) {
        return Err(ApiError::privilege_denied(Action::Download));
    }

    let oid = Oid::parse(&query.oid).map_err(ApiError::from)?;
    let (file, size) = scoped.open_read(&oid).await?;

    let stream = tokio_util::io::ReaderStream::new(file);
    let body = Body::from_stream(stream);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, size.to_string()),
            (header::CACHE_CONTROL, "no-transform".to_string()),
            (
                header::HeaderName::from_static("x-accel-buffering"),
                "no".to_string(),
            ),
        ],
        body,
    )
        .into_response())
}

/// `POST /<namespace>/<repo>/info/lfs/objects/verify`. Requires the `upload`
/// privilege — verification only ever follows an upload the caller made.
pub async fn handle_verify(
    State(state): State<Arc<AppState>>,
    Path((namespace, repo_name)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: VerifyRequest =
        serde_json::from_slice(&body).map_err(|e| Error::BadJson(e.to_string()))?;

    let repo = canonical_repo_name(&format!("{namespace}/{repo_name}"));
    let scoped = state.blob_store.scope(&repo)?;
    let token = authenticate(&headers, &state.token_store).await?;

    if !token.privileges.has(&repo, Action::Upload) {
        return Err(ApiError::privilege_denied(Action::Upload));
    }

    let oid = Oid::parse(&request.oid).map_err(ApiError::from)?;
    if scoped.exists(&oid, Some(request.size)).await? {
        Ok(StatusCode::OK.into_response())
    } else {
        Ok(StatusCode::NOT_FOUND.into_response())
    }
}
