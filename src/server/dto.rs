use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub operation: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub transfers: Option<Vec<String>>,
    pub objects: Vec<ObjectSpec>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub transfer: &'static str,
    pub objects: Vec<ObjectResponse>,
}

#[derive(Debug, Deserialize)]
pub struct ObjectSpec {
    pub oid: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct ObjectResponse {
    pub oid: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<HashMap<&'static str, ActionDto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ObjectErrorDto>,
}

impl ObjectResponse {
    #[must_use]
    pub fn skip(oid: String, size: u64) -> Self {
        Self {
            oid,
            size,
            actions: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_actions(oid: String, size: u64, actions: HashMap<&'static str, ActionDto>) -> Self {
        Self {
            oid,
            size,
            actions: Some(actions),
            error: None,
        }
    }

    #[must_use]
    pub fn with_error(oid: String, size: u64, code: u16, message: impl Into<String>) -> Self {
        Self {
            oid,
            size,
            actions: None,
            error: Some(ObjectErrorDto {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActionDto {
    pub href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<HashMap<String, String>>,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct ObjectErrorDto {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub oid: String,
    pub size: u64,
}

/// Standard error body: `{message, documentation_url, request_id}`. Both of
/// the latter are permitted to be empty strings but must always be present.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub documentation_url: String,
    pub request_id: String,
}

impl ErrorBody {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            documentation_url: String::new(),
            request_id: String::new(),
        }
    }
}
