//! Hosted auth API adapter.

use async_trait::async_trait;
use gate_common::Principal;
use reqwest::{Client, StatusCode};

use super::provider::{IdentityProvider, ProviderError};

/// Asks the hosted auth service for the user behind an access token.
pub struct RemoteProvider {
    http_client: Client,
    user_url: String,
    api_key: String,
}

impl RemoteProvider {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            user_url: format!("{}/auth/v1/user", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for RemoteProvider {
    async fn get_user(&self, access_token: Option<&str>) -> Result<Option<Principal>, ProviderError> {
        let token = access_token.ok_or(ProviderError::SessionMissing)?;

        let response = self.http_client
            .get(&self.user_url)
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected { status: status.as_u16(), message });
        }

        response
            .json::<Option<Principal>>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}
