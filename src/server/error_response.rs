use axum::Json;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::{Error, ErrorCategory};
use crate::types::Action;

use super::dto::ErrorBody;

/// The HTTP-facing error shape. Most handlers build this via `From<Error>`;
/// the authorization-by-intent split (403 on upload, 404 on download) is
/// context the core [`Error`] type doesn't carry, so callers construct it
/// directly with [`ApiError::privilege_denied`] for that one case.
pub struct ApiError {
    status: StatusCode,
    message: String,
    bearer_challenge: bool,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            bearer_challenge: false,
        }
    }

    #[must_use]
    pub fn privilege_denied(intent: Action) -> Self {
        match intent {
            Action::Upload => Self::new(StatusCode::FORBIDDEN, "no privilege for this operation"),
            Action::Download => Self::new(StatusCode::NOT_FOUND, "no privilege for this operation"),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err.category() {
            ErrorCategory::Validation => ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            ErrorCategory::Authentication => ApiError {
                status: StatusCode::UNAUTHORIZED,
                message: err.to_string(),
                bearer_challenge: true,
            },
            ErrorCategory::Authorization => ApiError::new(StatusCode::FORBIDDEN, err.to_string()),
            ErrorCategory::NotFound => ApiError::new(StatusCode::NOT_FOUND, err.to_string()),
            ErrorCategory::Protocol => match err {
                Error::WrongMethod => ApiError::new(StatusCode::METHOD_NOT_ALLOWED, err.to_string()),
                Error::UnsupportedMediaType => {
                    ApiError::new(StatusCode::NOT_ACCEPTABLE, err.to_string())
                }
                Error::UnknownOperation(_) => {
                    ApiError::new(StatusCode::NOT_IMPLEMENTED, err.to_string())
                }
                other => ApiError::new(StatusCode::BAD_REQUEST, other.to_string()),
            },
            ErrorCategory::Internal => {
                tracing::error!(error = %err, "internal error");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(ErrorBody::new(self.message))).into_response();
        if self.bearer_challenge {
            let challenge = HeaderValue::from_static("Basic realm=\"Git LFS\"");
            response
                .headers_mut()
                .insert("WWW-Authenticate", challenge.clone());
            response.headers_mut().insert("LFS-Authenticate", challenge);
        }
        response
    }
}
