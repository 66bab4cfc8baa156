//! Identity provider client handles.

use std::sync::Arc;

use gate_common::Principal;
use tokio::sync::OnceCell;

use crate::config::ProviderConfig;

use super::context::RequestContext;
use super::provider::{self, IdentityProvider, ProviderError};

/// A provider handle bound to one session context.
#[derive(Clone)]
pub struct AuthClient {
    provider: Arc<dyn IdentityProvider>,
    context: RequestContext,
}

impl AuthClient {
    /// Bind an already-connected provider to a context. Never touches the network.
    pub fn new(provider: Arc<dyn IdentityProvider>, context: RequestContext) -> Self {
        Self { provider, context }
    }

    /// Ask the provider who owns this client's session.
    pub async fn get_user(&self) -> Result<Option<Principal>, ProviderError> {
        self.provider.get_user(self.context.access_token()).await
    }
}

enum ProviderSource {
    Ready(Arc<dyn IdentityProvider>),
    Connect(ProviderConfig),
}

/// Builds an [`AuthClient`] per request.
///
/// The provider connection is established on first use and shared by every
/// client created afterwards.
pub struct ServerClientFactory {
    source: ProviderSource,
    provider: OnceCell<Arc<dyn IdentityProvider>>,
}

impl ServerClientFactory {
    /// Connect lazily using `config` on the first request.
    pub fn connect_lazily(config: ProviderConfig) -> Self {
        Self {
            source: ProviderSource::Connect(config),
            provider: OnceCell::new(),
        }
    }

    pub fn from_provider(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            source: ProviderSource::Ready(provider),
            provider: OnceCell::new(),
        }
    }

    pub async fn create(&self, context: &RequestContext) -> Result<AuthClient, ProviderError> {
        let provider = self
            .provider
            .get_or_try_init(|| async {
                match &self.source {
                    ProviderSource::Ready(provider) => Ok(provider.clone()),
                    ProviderSource::Connect(config) => {
                        tracing::info!(mode = ?config.mode, "Connecting identity provider");
                        provider::connect(config).await
                    }
                }
            })
            .await?;

        Ok(AuthClient::new(provider.clone(), context.clone()))
    }
}
