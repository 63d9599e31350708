use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::typed_header::TypedHeaderRejection;

use tracker_types::api::{
    LoginRequest, LoginResponse, MessageResponse, RegisterRequest, ResetPasswordRequest,
};

use crate::error::ServiceError;
use crate::middleware::{BearerHeader, bearer_token};
use crate::state::{AppState, run_blocking};

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(req) = payload?;

    let user = run_blocking(&state, move |app| {
        app.sessions.register(
            &req.email,
            &req.password,
            &req.security_question,
            &req.security_answer,
        )
    })
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Only one session per client: a still-valid bearer token on this call is refused.
pub async fn login(
    State(state): State<AppState>,
    bearer: Result<BearerHeader, TypedHeaderRejection>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let presented = bearer_token(bearer).ok();
    let Json(req) = payload?;

    let session = run_blocking(&state, move |app| {
        app.sessions.login(&req.email, &req.password, presented.as_deref())
    })
    .await?;

    Ok(Json(LoginResponse {
        user_id: session.user.id,
        email: session.user.email,
        role: session.user.role,
        token: session.token,
    }))
}

/// Not behind `require_auth`: logging out an already revoked token still succeeds.
pub async fn logout(
    State(state): State<AppState>,
    bearer: Result<BearerHeader, TypedHeaderRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let token = bearer_token(bearer)?;
    run_blocking(&state, move |app| app.sessions.logout(&token)).await?;
    Ok(Json(MessageResponse::new("logged out")))
}

pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(req) = payload?;

    run_blocking(&state, move |app| {
        app.sessions
            .reset_password(&req.email, &req.security_answer, &req.new_password)
    })
    .await?;

    Ok(Json(MessageResponse::new("password updated")))
}
