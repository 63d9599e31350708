use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, requests, users};

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/requests", post(requests::create_request).get(requests::list_requests))
        .route("/requests/{id}", get(requests::get_request).put(requests::update_request))
        .route("/users", get(users::list_users))
        .route("/users/{id}/role", post(users::change_role))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
