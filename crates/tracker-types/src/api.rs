use serde::{Deserialize, Serialize};

use crate::models::{RequestKind, RequestPatch, RequestStatus, Role, RoleAction};

// -- JWT Claims --

/// Session token claims. `jti` is the blacklist key used by logout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub role: Role,
    pub jti: String,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub security_question: String,
    pub security_answer: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub security_answer: String,
    pub new_password: String,
}

// -- Requests --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRequestBody {
    pub title: String,
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: RequestKind,
}

/// Body of `PUT /requests/{id}`. Every field is optional; `version` is the
/// optimistic-concurrency token the client last saw.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRequestBody {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<RequestKind>,
    pub status: Option<RequestStatus>,
    pub version: Option<i64>,
}

impl UpdateRequestBody {
    pub fn into_parts(self) -> (RequestPatch, Option<i64>) {
        let patch = RequestPatch {
            kind: self.kind,
            title: self.title,
            description: self.description,
            status: self.status,
        };
        (patch, self.version)
    }
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleChangeRequest {
    pub action: RoleAction,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
