//! Hosted database adapter speaking the PostgREST dialect.

use async_trait::async_trait;
use gate_common::PermissionRow;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::models::{NewTenantLogin, TenantLogin};

use super::{optional, single, StoreError, TenantKey, TenantStore, TenantUpdate, UserStore};

/// User and tenant store backed by the hosted database's REST API.
///
/// Uses the service-role key, so row-level security does not apply.
pub struct RestStore {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/{}", self.base_url, table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn rows<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Self::check(response)
            .await?
            .json::<Vec<T>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected { status: status.as_u16(), message })
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

fn update_body(update: &TenantUpdate) -> Value {
    let mut body = Map::new();
    if let Some(hash) = &update.password_hash {
        body.insert("password_hash".to_string(), json!(hash));
    }
    if let Some(enabled) = update.enabled {
        body.insert("enabled".to_string(), json!(enabled));
    }
    if update.clear_invite {
        body.insert("invite_token".to_string(), Value::Null);
        body.insert("invite_expires_at".to_string(), Value::Null);
    }
    if update.clear_reset {
        body.insert("reset_token".to_string(), Value::Null);
        body.insert("reset_expires_at".to_string(), Value::Null);
    } else if let Some((token, expires)) = &update.reset {
        body.insert("reset_token".to_string(), json!(token));
        body.insert("reset_expires_at".to_string(), json!(expires.to_rfc3339()));
    }
    if let Some(at) = update.last_login_at {
        body.insert("last_login_at".to_string(), json!(at.to_rfc3339()));
    }
    Value::Object(body)
}

#[async_trait]
impl UserStore for RestStore {
    async fn fetch_permission(&self, user_id: &str) -> Result<PermissionRow, StoreError> {
        let request = self
            .request(Method::GET, "users")
            .query(&[("select", "permission".to_string()), ("id", eq(user_id))]);
        single(Self::rows(request).await?)
    }
}

#[async_trait]
impl TenantStore for RestStore {
    async fn find_tenant(&self, key: TenantKey<'_>) -> Result<Option<TenantLogin>, StoreError> {
        let request = self
            .request(Method::GET, "tenant_logins")
            .query(&[("select", "*".to_string()), (key.column(), eq(key.value()))]);
        optional(Self::rows(request).await?)
    }

    async fn insert_tenant(&self, login: &NewTenantLogin) -> Result<TenantLogin, StoreError> {
        let request = self
            .request(Method::POST, "tenant_logins")
            .header("Prefer", "return=representation")
            .json(login);
        let created: TenantLogin = single(Self::rows(request).await?)?;
        tracing::info!("Created tenant login {} for contractor {}", created.id, created.contractor_id);
        Ok(created)
    }

    async fn update_tenant(&self, id: &str, update: &TenantUpdate) -> Result<bool, StoreError> {
        let mut filters = vec![("id", eq(id))];
        if let Some(token) = &update.require_token {
            filters.push((token.column(), eq(token.value())));
        }
        let request = self
            .request(Method::PATCH, "tenant_logins")
            .query(&filters)
            .header("Prefer", "return=representation")
            .json(&update_body(update));
        let rows: Vec<TenantLogin> = Self::rows(request).await?;
        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OneTimeToken;
    use chrono::{Duration, Utc};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tenant_json(id: &str) -> Value {
        json!({
            "id": id,
            "contractor_id": "c1",
            "email": "mieter@example.com",
            "password_hash": "$2b$04$hash",
            "enabled": true,
            "invite_token": null,
            "invite_expires_at": null,
            "reset_token": null,
            "reset_expires_at": null,
            "last_login_at": "2024-05-01T10:00:00+00:00",
            "created_at": "2024-04-01T10:00:00+00:00"
        })
    }

    #[tokio::test]
    async fn test_fetch_permission_single_row() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users"))
            .and(query_param("select", "permission"))
            .and(query_param("id", "eq.u1"))
            .and(header("apikey", "service"))
            .and(header("authorization", "Bearer service"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"permission": "admin"}])))
            .expect(1)
            .mount(&server)
            .await;

        let store = RestStore::new(&server.uri(), "service");
        let row = store.fetch_permission("u1").await.unwrap();
        assert!(row.grants_admin());
    }

    #[tokio::test]
    async fn test_fetch_permission_no_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let store = RestStore::new(&server.uri(), "service");
        assert!(matches!(store.fetch_permission("u3").await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_fetch_permission_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let store = RestStore::new(&server.uri(), "service");
        let err = store.fetch_permission("u1").await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_find_tenant_by_email() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tenant_logins"))
            .and(query_param("email", "eq.mieter@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([tenant_json("t1")])))
            .mount(&server)
            .await;

        let store = RestStore::new(&server.uri(), "service");
        let login = store
            .find_tenant(TenantKey::Email("mieter@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(login.id, "t1");
        assert!(login.enabled);
        assert!(login.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_update_sends_only_changed_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/tenant_logins"))
            .and(query_param("id", "eq.t1"))
            .and(header("prefer", "return=representation"))
            .and(body_json(json!({
                "password_hash": "new-hash",
                "invite_token": null,
                "invite_expires_at": null
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([tenant_json("t1")])))
            .expect(1)
            .mount(&server)
            .await;

        let store = RestStore::new(&server.uri(), "service");
        let update = TenantUpdate {
            password_hash: Some("new-hash".to_string()),
            clear_invite: true,
            ..Default::default()
        };
        assert!(store.update_tenant("t1", &update).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_unknown_id_reports_false() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/tenant_logins"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let store = RestStore::new(&server.uri(), "service");
        let update = TenantUpdate {
            enabled: Some(false),
            ..Default::default()
        };
        assert!(!store.update_tenant("missing", &update).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_with_required_token_filters_on_it() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/tenant_logins"))
            .and(query_param("id", "eq.t1"))
            .and(query_param("reset_token", "eq.r1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let store = RestStore::new(&server.uri(), "service");
        let update = TenantUpdate {
            require_token: Some(OneTimeToken::Reset("r1".to_string())),
            clear_reset: true,
            ..Default::default()
        };
        assert!(!store.update_tenant("t1", &update).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_returns_representation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant_logins"))
            .and(header("prefer", "return=representation"))
            .and(header("apikey", "service"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([tenant_json("t9")])))
            .expect(1)
            .mount(&server)
            .await;

        let store = RestStore::new(&server.uri(), "service");
        let login = NewTenantLogin::new("c1", "mieter@example.com", "hash".to_string(), "tok".to_string(), Utc::now() + Duration::hours(1));
        let created = store.insert_tenant(&login).await.unwrap();
        assert_eq!(created.id, "t9");
        assert_eq!(created.contractor_id, "c1");
        assert!(created.enabled);
    }

    #[test]
    fn test_update_body_reset_token() {
        let expires = Utc::now();
        let body = update_body(&TenantUpdate {
            reset: Some(("r1".to_string(), expires)),
            ..Default::default()
        });
        assert_eq!(body["reset_token"], "r1");
        assert_eq!(body["reset_expires_at"], expires.to_rfc3339());
        assert!(body.get("password_hash").is_none());
    }
}
