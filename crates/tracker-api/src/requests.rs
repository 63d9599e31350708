use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use tracker_types::api::{CreateRequestBody, UpdateRequestBody};
use tracker_types::models::Identity;

use crate::error::ServiceError;
use crate::state::{AppState, run_blocking};

pub async fn create_request(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<CreateRequestBody>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(body) = payload?;

    let request = run_blocking(&state, move |app| {
        app.lifecycle
            .create_request(&identity, &body.title, &body.description, body.kind)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_requests(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ServiceError> {
    let requests = run_blocking(&state, move |app| app.lifecycle.list_requests(&identity)).await?;
    Ok(Json(requests))
}

pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ServiceError> {
    let request =
        run_blocking(&state, move |app| app.lifecycle.get_request(&identity, request_id)).await?;
    Ok(Json(request))
}

pub async fn update_request(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<UpdateRequestBody>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(body) = payload?;
    let (changes, expected_version) = body.into_parts();

    let request = run_blocking(&state, move |app| {
        app.lifecycle
            .update_request(&identity, request_id, changes, expected_version)
    })
    .await?;

    Ok(Json(request))
}
