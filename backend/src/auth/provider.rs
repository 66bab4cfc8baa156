//! Identity provider seam.

use std::sync::Arc;

use async_trait::async_trait;
use gate_common::Principal;

use crate::config::{ProviderConfig, ProviderMode};

use super::jwks::JwksProvider;
use super::remote::RemoteProvider;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Auth session missing")]
    SessionMissing,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),
    #[error("JWKS fetch error: {0}")]
    JwksFetchError(String),
    #[error("Identity provider rejected session ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Identity provider unreachable: {0}")]
    Transport(String),
    #[error("Malformed identity provider response: {0}")]
    Decode(String),
}

/// Something that can tell who owns an access token.
///
/// `Ok(None)` means the provider answered but knows no user for the token.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_user(&self, access_token: Option<&str>) -> Result<Option<Principal>, ProviderError>;
}

/// Build the provider selected by `config.mode`.
pub async fn connect(config: &ProviderConfig) -> Result<Arc<dyn IdentityProvider>, ProviderError> {
    match config.mode {
        ProviderMode::Remote => Ok(Arc::new(RemoteProvider::new(&config.url, &config.anon_key))),
        ProviderMode::Jwks => {
            let provider = JwksProvider::new(&config.issuer(), config.jwt_audience.as_deref()).await?;
            Ok(Arc::new(provider))
        }
    }
}
