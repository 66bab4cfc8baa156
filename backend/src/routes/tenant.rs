use std::sync::Arc;

use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use gate_common::TenantSession;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{RequestContext, Unauthorized};
use crate::error::ApiResult;
use crate::tenant::{cleared_cookie, session_cookie, SignedIn};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Body of both setup and reset: a one-time token plus the new password.
#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TenantSummary {
    pub id: String,
    pub email: String,
    pub contractor_id: String,
}

fn signed_in_response(state: &AppState, signed_in: SignedIn) -> Response {
    let tenant = &state.config.tenant;
    let cookie = session_cookie(
        &tenant.cookie_name,
        &signed_in.session_token,
        tenant.session_max_age_secs(),
        tenant.secure_cookies,
    );
    let summary = TenantSummary {
        id: signed_in.tenant.id,
        email: signed_in.tenant.email,
        contractor_id: signed_in.tenant.contractor_id,
    };

    ([(SET_COOKIE, cookie)], Json(json!({"success": true, "tenant": summary}))).into_response()
}

async fn login(State(state): State<Arc<AppState>>, Json(request): Json<LoginRequest>) -> ApiResult<Response> {
    let signed_in = state.tenants.login(&request.email, &request.password).await?;
    Ok(signed_in_response(&state, signed_in))
}

async fn setup(State(state): State<Arc<AppState>>, Json(request): Json<PasswordRequest>) -> ApiResult<Response> {
    let signed_in = state.tenants.setup_password(&request.token, &request.password).await?;
    Ok(signed_in_response(&state, signed_in))
}

async fn reset(State(state): State<Arc<AppState>>, Json(request): Json<PasswordRequest>) -> ApiResult<Response> {
    let signed_in = state.tenants.reset_password(&request.token, &request.password).await?;
    Ok(signed_in_response(&state, signed_in))
}

async fn logout(State(state): State<Arc<AppState>>) -> Response {
    let tenant = &state.config.tenant;
    let cookie = cleared_cookie(&tenant.cookie_name, tenant.secure_cookies);
    ([(SET_COOKIE, cookie)], Json(json!({"success": true}))).into_response()
}

async fn session(State(state): State<Arc<AppState>>, context: RequestContext) -> ApiResult<Json<TenantSession>> {
    let token = context.tenant_session().ok_or_else(Unauthorized::no_user)?;
    let session = state
        .tenants
        .verify_session(token)
        .await
        .ok_or_else(Unauthorized::no_user)?;
    Ok(Json(session))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/tenant/login", post(login))
        .route("/tenant/setup", post(setup))
        .route("/tenant/reset", post(reset))
        .route("/tenant/logout", post(logout))
        .route("/tenant/session", get(session))
        .with_state(state)
}
