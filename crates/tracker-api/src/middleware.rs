use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};

use crate::error::{AuthError, ServiceError};
use crate::state::{AppState, run_blocking};

pub type BearerHeader = TypedHeader<Authorization<Bearer>>;

/// Verify the bearer token (signature, expiry and blacklist) and attach the
/// caller's `Identity` to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<BearerHeader, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let token = bearer_token(bearer)?;
    let identity = run_blocking(&state, move |app| app.sessions.verify(&token)).await?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

pub(crate) fn bearer_token(
    bearer: Result<BearerHeader, TypedHeaderRejection>,
) -> Result<String, AuthError> {
    match bearer {
        Ok(TypedHeader(Authorization(bearer))) => Ok(bearer.token().to_string()),
        Err(rejection) if rejection.is_missing() => Err(AuthError::MissingToken),
        Err(_) => Err(AuthError::InvalidToken),
    }
}
