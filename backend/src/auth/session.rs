//! Session resolution: who is calling?

use gate_common::Principal;

use super::client::{AuthClient, ServerClientFactory};
use super::context::RequestContext;
use super::provider::ProviderError;

/// Why a session did not resolve. Kept for logs; never shown to callers.
#[derive(Debug)]
pub enum UnauthorizedCause {
    NoUser,
    Provider(ProviderError),
}

/// The caller has no valid session.
///
/// Displays as exactly `Unauthorized` whatever the cause.
#[derive(Debug, thiserror::Error)]
#[error("Unauthorized")]
pub struct Unauthorized {
    cause: UnauthorizedCause,
}

impl Unauthorized {
    pub fn no_user() -> Self {
        Self { cause: UnauthorizedCause::NoUser }
    }

    pub fn provider(err: ProviderError) -> Self {
        Self { cause: UnauthorizedCause::Provider(err) }
    }

    pub fn cause(&self) -> &UnauthorizedCause {
        &self.cause
    }
}

/// Resolve the principal behind a long-lived client handle.
pub async fn get_authenticated_user(client: &AuthClient) -> Result<Principal, Unauthorized> {
    resolve(client).await
}

/// Resolve the principal behind the session of the current request.
pub async fn get_authenticated_server_user(
    factory: &ServerClientFactory,
    context: &RequestContext,
) -> Result<Principal, Unauthorized> {
    let client = factory.create(context).await.map_err(|e| {
        tracing::warn!(error = %e, "Identity provider unavailable");
        Unauthorized::provider(e)
    })?;
    resolve(&client).await
}

async fn resolve(client: &AuthClient) -> Result<Principal, Unauthorized> {
    match client.get_user().await {
        Ok(Some(principal)) => Ok(principal),
        Ok(None) => {
            tracing::debug!("Identity provider returned no user");
            Err(Unauthorized::no_user())
        }
        Err(e) => {
            tracing::debug!(error = %e, "Session rejected");
            Err(Unauthorized::provider(e))
        }
    }
}
