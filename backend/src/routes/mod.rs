pub mod admin;
pub mod auth;
pub mod health;
pub mod tenant;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{middleware, Json, Router};
use serde_json::json;

use crate::auth::guard::enforce_routes;
use crate::logging::request_logger;
use crate::AppState;

/// The full HTTP surface, route guard included.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(auth::router(state.clone()))
        .merge(tenant::router(state.clone()))
        .nest("/api/admin", admin::router(state.clone()))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state, enforce_routes))
        .layer(middleware::from_fn(request_logger))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"success": false, "error": "Not found"})),
    )
}
