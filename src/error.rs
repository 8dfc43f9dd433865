use thiserror::Error;

/// Crate-wide error type. Every fallible core operation returns one of these
/// instead of panicking; the HTTP boundary classifies each variant into the
/// taxonomy described in the design docs and maps it to a status code.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid OID format")]
    InvalidOid,

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("malformed request body: {0}")]
    BadJson(String),

    #[error("missing credentials")]
    MissingCredentials,

    #[error("bad password")]
    BadPassword,

    #[error("token expired")]
    ExpiredToken,

    #[error("no privilege for this operation")]
    NoPrivilege,

    #[error("unknown repository: {0}")]
    UnknownRepo(String),

    #[error("object not found")]
    BlobMissing,

    #[error("method not allowed")]
    WrongMethod,

    #[error("unsupported media type")]
    UnsupportedMediaType,

    #[error("unknown batch operation: {0}")]
    UnknownOperation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Classification of an [`Error`] into the status-code family it maps to at
/// the HTTP boundary. Kept separate from `Error` itself so that non-HTTP
/// callers (the CLI) can match on category without depending on axum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Protocol,
    Internal,
}

impl Error {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidOid
            | Error::InvalidAction(_)
            | Error::MissingField(_)
            | Error::BadJson(_) => ErrorCategory::Validation,

            Error::MissingCredentials | Error::BadPassword | Error::ExpiredToken => {
                ErrorCategory::Authentication
            }

            Error::NoPrivilege => ErrorCategory::Authorization,

            Error::UnknownRepo(_) | Error::BlobMissing => ErrorCategory::NotFound,

            Error::WrongMethod | Error::UnsupportedMediaType | Error::UnknownOperation(_) => {
                ErrorCategory::Protocol
            }

            Error::Io(_) | Error::Internal(_) => ErrorCategory::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
