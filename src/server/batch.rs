use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;

use crate::error::Error;
use crate::types::{canonical_repo_name, Action, Oid};

use super::authn::authenticate;
use super::dto::{ActionDto, BatchRequest, BatchResponse, ObjectResponse, LFS_MEDIA_TYPE};
use super::error_response::ApiError;
use super::router::AppState;
use super::base_url;

/// `POST /<namespace>/<repo>/info/lfs/objects/batch`.
pub async fn handle_batch(
    State(state): State<Arc<AppState>>,
    Path((namespace, repo_name)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    check_media_type(&headers)?;

    let request: BatchRequest =
        serde_json::from_slice(&body).map_err(|e| Error::BadJson(e.to_string()))?;
    let operation = Action::parse(&request.operation)?;

    let repo = canonical_repo_name(&format!("{namespace}/{repo_name}"));
    let scoped = state.blob_store.scope(&repo)?;

    let token = authenticate(&headers, &state.token_store).await?;

    if !token.privileges.has(&repo, operation) {
        return Err(ApiError::privilege_denied(operation));
    }

    let base = base_url(&state.config, &headers);
    let mut objects = Vec::with_capacity(request.objects.len());

    for spec in request.objects {
        let oid = match Oid::parse(&spec.oid) {
            Ok(oid) => oid,
            Err(_) => {
                objects.push(ObjectResponse::with_error(
                    spec.oid,
                    spec.size,
                    422,
                    "invalid object id",
                ));
                continue;
            }
        };

        let response = match operation {
            Action::Upload => {
                if scoped.exists(&oid, Some(spec.size)).await? {
                    ObjectResponse::skip(spec.oid, spec.size)
                } else {
                    let mut actions = HashMap::new();
                    actions.insert(
                        "upload",
                        transfer_action(&base, &namespace, &repo_name, "upload", &oid, spec.size, &token),
                    );
                    actions.insert(
                        "verify",
                        transfer_action(&base, &namespace, &repo_name, "verify", &oid, spec.size, &token),
                    );
                    ObjectResponse::with_actions(spec.oid, spec.size, actions)
                }
            }
            Action::Download => {
                if scoped.exists(&oid, Some(spec.size)).await? {
                    let mut actions = HashMap::new();
                    actions.insert(
                        "download",
                        transfer_action(&base, &namespace, &repo_name, "download", &oid, spec.size, &token),
                    );
                    ObjectResponse::with_actions(spec.oid, spec.size, actions)
                } else {
                    ObjectResponse::with_error(spec.oid, spec.size, 404, "Object does not exist")
                }
            }
        };
        objects.push(response);
    }

    let body = BatchResponse {
        transfer: "basic",
        objects,
    };

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, LFS_MEDIA_TYPE)],
        Json(body),
    )
        .into_response())
}

/// Builds an absolute transfer URL reusing the two literal path segments the
/// route was matched on, rather than the canonicalized repo name — the
/// canonical form may have collapsed separators or a `.git` suffix, but the
/// client must be handed back a URL on the same path it POSTed the batch to.
fn transfer_action(
    base: &str,
    namespace: &str,
    repo_name: &str,
    kind: &str,
    oid: &Oid,
    size: u64,
    token: &crate::types::Token,
) -> ActionDto {
    let href = format!("{base}/{namespace}/{repo_name}/info/lfs/objects/{kind}?oid={oid}&size={size}");
    let mut header = HashMap::new();
    header.insert("Authorization".to_string(), token.auth_header());

    let expires_in = (token.expires_at - Utc::now()).num_seconds().max(0);

    ActionDto {
        href,
        header: Some(header),
        expires_in,
    }
}

fn check_media_type(headers: &HeaderMap) -> Result<(), Error> {
    let accept_ok = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(LFS_MEDIA_TYPE));
    if !accept_ok {
        return Err(Error::UnsupportedMediaType);
    }

    let content_type_ok = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(LFS_MEDIA_TYPE));
    if !content_type_ok {
        return Err(Error::UnsupportedMediaType);
    }

    Ok(())
}
