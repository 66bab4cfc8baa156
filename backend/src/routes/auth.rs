//! Session endpoints for the identity provider's users.
//!
//! - `GET /auth/user`: who is calling
//! - `GET /auth/permission`: whether the caller is an admin
//! - `GET /auth/verify`: forward-auth check for a page path

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use gate_common::Principal;
use serde::{Deserialize, Serialize};

use crate::auth::guard::{evaluate, RouteRules};
use crate::auth::{get_authenticated_server_user, is_admin_user, RequestContext};
use crate::error::ApiResult;
use crate::AppState;

/// Header set by reverse proxies doing forward auth.
const FORWARDED_URI: &str = "x-forwarded-uri";

#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub user_id: String,
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub path: Option<String>,
}

async fn current_user(State(state): State<Arc<AppState>>, context: RequestContext) -> ApiResult<Json<Principal>> {
    let principal = get_authenticated_server_user(&state.auth_clients, &context).await?;
    Ok(Json(principal))
}

async fn permission(State(state): State<Arc<AppState>>, context: RequestContext) -> ApiResult<Json<PermissionResponse>> {
    let principal = get_authenticated_server_user(&state.auth_clients, &context).await?;
    let is_admin = is_admin_user(state.users.as_ref(), &principal.id).await;
    Ok(Json(PermissionResponse {
        user_id: principal.id,
        is_admin,
    }))
}

/// 200 when the target may be served, otherwise the guard's redirect.
async fn verify(
    State(state): State<Arc<AppState>>,
    context: RequestContext,
    headers: HeaderMap,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let target = headers
        .get(FORWARDED_URI)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .or(query.path)
        .unwrap_or_else(|| "/".to_string());
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target.as_str(), None),
    };

    let decision = evaluate(&state, &context, path).await;
    match RouteRules::new(&state.config.routes).location(&decision, query) {
        Some(location) => Redirect::temporary(&location).into_response(),
        None => StatusCode::OK.into_response(),
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/user", get(current_user))
        .route("/auth/permission", get(permission))
        .route("/auth/verify", get(verify))
        .with_state(state)
}
