use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
};

use tracker_types::api::RoleChangeRequest;
use tracker_types::models::Identity;

use crate::error::ServiceError;
use crate::state::{AppState, run_blocking};

pub async fn list_users(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ServiceError> {
    let users = run_blocking(&state, move |app| app.roles.list_users(&identity)).await?;
    Ok(Json(users))
}

pub async fn change_role(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<RoleChangeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(body) = payload?;

    let user = run_blocking(&state, move |app| {
        app.roles.change_role(&identity, body.action, user_id)
    })
    .await?;

    Ok(Json(user))
}
