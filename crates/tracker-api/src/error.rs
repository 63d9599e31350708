//! Error kinds surfaced by the core and their HTTP rendering.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use tracker_db::StoreError;
use tracker_types::api::MessageResponse;

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Authentication and session failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("a user is already logged in on this client")]
    AlreadyLoggedIn,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("token has been revoked")]
    Revoked,

    #[error("missing bearer token")]
    MissingToken,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or missing input the caller can correct.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// A concurrent writer got there first, or a uniqueness rule was hit.
    #[error("{0}")]
    Conflict(String),

    #[error("request data must be JSON")]
    UnsupportedMediaType,

    /// The persistence call overran its deadline. The blocking work is not
    /// cancelled and may still commit, so the caller should re-read before retrying.
    #[error("storage did not respond in time, the outcome is unknown")]
    Timeout,

    #[error("storage failure: {0}")]
    Storage(StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Auth(AuthError::AlreadyLoggedIn) => StatusCode::BAD_REQUEST,
            ServiceError::Auth(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ServiceError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Storage(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { id, .. } => {
                ServiceError::Conflict(format!("request {} was modified concurrently, reload and retry", id))
            }
            StoreError::DuplicateEmail => {
                ServiceError::Conflict("email already registered".to_string())
            }
            StoreError::LastAdministrator(_) => {
                ServiceError::Validation("cannot demote the last administrator".to_string())
            }
            other => ServiceError::Storage(other),
        }
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => ServiceError::UnsupportedMediaType,
            other => ServiceError::Validation(other.body_text()),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Storage and internal detail stays in the logs.
        let message = match &self {
            ServiceError::Storage(e) => {
                error!("Storage failure: {}", e);
                "internal storage error".to_string()
            }
            ServiceError::Internal(e) => {
                error!("Internal error: {}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(MessageResponse::new(message))).into_response()
    }
}
