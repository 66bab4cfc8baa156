use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use gate_common::Principal;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::provider::{IdentityProvider, ProviderError};

/// JWKS key set response.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    #[allow(dead_code)]
    alg: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

/// Access token claims issued by the hosted auth service.
#[derive(Debug, Deserialize, Serialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    aud: serde_json::Value,
    #[serde(default)]
    app_metadata: serde_json::Value,
    #[serde(default)]
    user_metadata: serde_json::Value,
    exp: u64,
    #[serde(default)]
    iat: u64,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        let aud = match claims.aud {
            serde_json::Value::String(aud) => Some(aud),
            serde_json::Value::Array(values) => values.into_iter().find_map(|v| match v {
                serde_json::Value::String(aud) => Some(aud),
                _ => None,
            }),
            _ => None,
        };

        Principal {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
            aud,
            app_metadata: claims.app_metadata,
            user_metadata: claims.user_metadata,
            last_sign_in_at: None,
        }
    }
}

/// Verifies access tokens locally against the provider's published keys.
pub struct JwksProvider {
    http_client: Client,
    jwks_uri: String,
    keys: Arc<RwLock<HashMap<String, DecodingKey>>>,
    issuer: String,
    audience: Option<String>,
}

impl JwksProvider {
    pub async fn new(issuer: &str, audience: Option<&str>) -> Result<Self, ProviderError> {
        let http_client = Client::new();

        // Fetch OIDC configuration to get JWKS URI
        let config_url = format!("{}/.well-known/openid-configuration", issuer.trim_end_matches('/'));
        let config: OidcConfig = http_client
            .get(&config_url)
            .send()
            .await
            .map_err(|e| ProviderError::JwksFetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| ProviderError::JwksFetchError(e.to_string()))?;

        let provider = Self {
            http_client,
            jwks_uri: config.jwks_uri,
            keys: Arc::new(RwLock::new(HashMap::new())),
            issuer: issuer.to_string(),
            audience: audience.map(String::from),
        };

        provider.refresh_keys().await?;

        Ok(provider)
    }

    async fn refresh_keys(&self) -> Result<(), ProviderError> {
        tracing::info!("Fetching JWKS from {}", self.jwks_uri);

        let response: JwksResponse = self.http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| ProviderError::JwksFetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| ProviderError::JwksFetchError(e.to_string()))?;

        let mut keys = self.keys.write().await;
        keys.clear();

        for jwk in response.keys {
            if jwk.kty == "RSA" {
                if let (Some(n), Some(e)) = (&jwk.n, &jwk.e) {
                    match DecodingKey::from_rsa_components(n, e) {
                        Ok(key) => {
                            keys.insert(jwk.kid.clone(), key);
                        }
                        Err(e) => {
                            tracing::warn!("Failed to parse RSA key {}: {}", jwk.kid, e);
                        }
                    }
                }
            }
        }

        tracing::info!("Loaded {} JWKS keys", keys.len());
        Ok(())
    }

    /// Validate a raw access token and return its claims as a principal.
    async fn verify(&self, token: &str) -> Result<Principal, ProviderError> {
        let header = decode_header(token)
            .map_err(|e| ProviderError::InvalidToken(e.to_string()))?;

        let kid = header.kid
            .ok_or_else(|| ProviderError::InvalidToken("Missing kid in token header".to_string()))?;

        let keys = self.keys.read().await;
        let key = keys.get(&kid)
            .ok_or_else(|| ProviderError::KeyNotFound(kid.clone()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        let token_data = decode::<Claims>(token, key, &validation)
            .map_err(|e| ProviderError::InvalidToken(e.to_string()))?;

        Ok(token_data.claims.into())
    }
}

#[async_trait]
impl IdentityProvider for JwksProvider {
    async fn get_user(&self, access_token: Option<&str>) -> Result<Option<Principal>, ProviderError> {
        let token = access_token.ok_or(ProviderError::SessionMissing)?;
        self.verify(token).await.map(Some)
    }
}

#[derive(Debug, Deserialize)]
struct OidcConfig {
    jwks_uri: String,
}
