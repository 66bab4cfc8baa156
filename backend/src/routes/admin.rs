//! Admin API routes, mounted under `/api/admin`.
//!
//! Provides:
//! - Tenant invites (`/tenants/invite`)
//! - Enabling and disabling tenant access (`/tenants/:id/enabled`)
//! - Password reset tokens (`/tenants/:id/reset-token`)

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{header::ORIGIN, HeaderMap},
    middleware::{self, Next},
    response::Response,
    routing::{patch, post},
    Json, Router,
};
use gate_common::Principal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::{get_authenticated_server_user, is_admin_user, RequestContext};
use crate::error::{ApiError, ApiResult};
use crate::tenant::ResetGrant;
use crate::AppState;

/// Middleware that requires an authenticated admin user.
///
/// The resolved principal is passed on as a request extension.
async fn require_admin(
    State(state): State<Arc<AppState>>,
    context: RequestContext,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = get_authenticated_server_user(&state.auth_clients, &context).await?;

    if !is_admin_user(state.users.as_ref(), &principal.id).await {
        tracing::info!(user_id = %principal.id, path = %request.uri().path(), "Admin access denied");
        return Err(ApiError::Forbidden);
    }

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    #[serde(default)]
    pub contractor_id: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub success: bool,
    pub tenant_login_id: String,
    pub setup_url: String,
    pub invite_expires_at: String,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub success: bool,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetTokenResponse {
    pub success: bool,
    #[serde(flatten)]
    pub grant: ResetGrant,
}

/// POST /api/admin/tenants/invite
async fn invite_tenant(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    axum::Extension(admin): axum::Extension<Principal>,
    Json(request): Json<InviteRequest>,
) -> ApiResult<Json<InviteResponse>> {
    let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
    let invitation = state.tenants.invite(&request.contractor_id, &request.email, origin).await?;

    tracing::info!(admin_id = %admin.id, tenant_id = %invitation.tenant_login_id, "Tenant invite created");

    Ok(Json(InviteResponse {
        success: true,
        tenant_login_id: invitation.tenant_login_id,
        setup_url: invitation.setup_url,
        invite_expires_at: invitation.invite_expires_at.to_rfc3339(),
    }))
}

/// PATCH /api/admin/tenants/:id/enabled
async fn set_enabled(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<ToggleResponse>> {
    let enabled = body
        .get("enabled")
        .and_then(Value::as_bool)
        .ok_or_else(|| ApiError::BadRequest("enabled must be a boolean".to_string()))?;

    state.tenants.set_enabled(&tenant_id, enabled).await?;
    Ok(Json(ToggleResponse { success: true, enabled }))
}

/// POST /api/admin/tenants/:id/reset-token
async fn issue_reset_token(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Json<ResetTokenResponse>> {
    let grant = state.tenants.issue_reset_token(&tenant_id).await?;
    Ok(Json(ResetTokenResponse { success: true, grant }))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/tenants/invite", post(invite_tenant))
        .route("/tenants/:id/enabled", patch(set_enabled))
        .route("/tenants/:id/reset-token", post(issue_reset_token))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{create_test_state, StaticProvider};
    use axum::body::Body;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn admin_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn state_with_users() -> Arc<AppState> {
        let provider = StaticProvider::by_token(&[("admin-token", "u1"), ("member-token", "u2")]);
        let (state, store) = create_test_state(Arc::new(provider));
        store.upsert_user("u1", Some("admin@example.com"), Some("admin")).unwrap();
        store.upsert_user("u2", Some("member@example.com"), Some("member")).unwrap();
        state
    }

    #[tokio::test]
    async fn test_require_admin_statuses() {
        let state = state_with_users();
        let body = serde_json::json!({"contractor_id": "c1", "email": "m@example.com"});

        let anonymous = router(state.clone())
            .oneshot(admin_request("POST", "/tenants/invite", None, body.clone()))
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let member = router(state.clone())
            .oneshot(admin_request("POST", "/tenants/invite", Some("member-token"), body.clone()))
            .await
            .unwrap();
        assert_eq!(member.status(), StatusCode::FORBIDDEN);

        let admin = router(state)
            .oneshot(admin_request("POST", "/tenants/invite", Some("admin-token"), body))
            .await
            .unwrap();
        assert_eq!(admin.status(), StatusCode::OK);
        let body = json_body(admin).await;
        assert_eq!(body["success"], true);
        assert!(body["setup_url"].as_str().unwrap().contains("/tenant/setup?token="));
    }

    #[tokio::test]
    async fn test_duplicate_invite_conflicts() {
        let state = state_with_users();
        let body = serde_json::json!({"contractor_id": "c1", "email": "m@example.com"});

        router(state.clone())
            .oneshot(admin_request("POST", "/tenants/invite", Some("admin-token"), body.clone()))
            .await
            .unwrap();
        let again = router(state)
            .oneshot(admin_request("POST", "/tenants/invite", Some("admin-token"), body))
            .await
            .unwrap();

        assert_eq!(again.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(again).await["error"], "Tenant already has a login record");
    }

    #[tokio::test]
    async fn test_toggle_requires_boolean() {
        let state = state_with_users();
        let response = router(state)
            .oneshot(admin_request("PATCH", "/tenants/t1/enabled", Some("admin-token"), serde_json::json!({"enabled": "no"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "enabled must be a boolean");
    }

    #[tokio::test]
    async fn test_toggle_and_reset_unknown_tenant() {
        let state = state_with_users();

        let toggle = router(state.clone())
            .oneshot(admin_request("PATCH", "/tenants/missing/enabled", Some("admin-token"), serde_json::json!({"enabled": false})))
            .await
            .unwrap();
        assert_eq!(toggle.status(), StatusCode::NOT_FOUND);

        let reset = router(state)
            .oneshot(admin_request("POST", "/tenants/missing/reset-token", Some("admin-token"), Value::Null))
            .await
            .unwrap();
        assert_eq!(reset.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_toggle_existing_tenant() {
        let state = state_with_users();
        let invitation = state.tenants.invite("c1", "m@example.com", None).await.unwrap();

        let response = router(state)
            .oneshot(admin_request(
                "PATCH",
                &format!("/tenants/{}/enabled", invitation.tenant_login_id),
                Some("admin-token"),
                serde_json::json!({"enabled": false}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({"success": true, "enabled": false}));
    }
}
