//! API error type and its JSON rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::Unauthorized;
use crate::tenant::TenantError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Unauthorized(#[from] Unauthorized),

    #[error("Admin access required")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Tenant(#[from] TenantError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Tenant(e) => match e {
                TenantError::MissingCredentials
                | TenantError::MissingToken
                | TenantError::PasswordTooShort(_)
                | TenantError::InvalidLink
                | TenantError::MissingContractor
                | TenantError::InvalidEmail => StatusCode::BAD_REQUEST,
                TenantError::InvalidCredentials | TenantError::PasswordNotSet => StatusCode::UNAUTHORIZED,
                TenantError::AccountDisabled => StatusCode::FORBIDDEN,
                TenantError::NotFound => StatusCode::NOT_FOUND,
                TenantError::AlreadyInvited | TenantError::EmailTaken => StatusCode::CONFLICT,
                TenantError::Store(_) | TenantError::Hashing(_) | TenantError::Signing(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Message shown to the client. Server-side failures stay generic.
    fn public_message(&self) -> String {
        if self.status().is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Unauthorized(e) => tracing::debug!(cause = ?e.cause(), "Unauthorized request"),
            other if status.is_server_error() => tracing::error!("Request failed: {}", other),
            _ => {}
        }

        let body = Json(json!({
            "success": false,
            "error": self.public_message(),
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn test_unauthorized_message_is_fixed() {
        let err = ApiError::from(Unauthorized::no_user());
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.public_message(), "Unauthorized");
    }

    #[test]
    fn test_tenant_error_statuses() {
        assert_eq!(ApiError::from(TenantError::InvalidCredentials).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(TenantError::AccountDisabled).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(TenantError::AlreadyInvited).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(TenantError::InvalidLink).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(TenantError::NotFound).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_store_failures_are_not_leaked() {
        let err = ApiError::from(TenantError::Store(StoreError::DatabaseError("disk I/O error at /var/db".to_string())));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[tokio::test]
    async fn test_body_shape() {
        let response = ApiError::BadRequest("contractor_id is required".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"success": false, "error": "contractor_id is required"}));
    }
}
