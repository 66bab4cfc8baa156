pub mod config;
pub mod routes;
pub mod auth;
pub mod store;
pub mod models;
pub mod tenant;
pub mod logging;
pub mod error;
pub mod test_util;

pub use config::Config;
pub use auth::{
    get_authenticated_server_user, get_authenticated_user, is_admin_user, AuthClient, IdentityProvider,
    RequestContext, ServerClientFactory, Unauthorized,
};
pub use error::ApiError;
pub use store::{Stores, TenantStore, UserStore};
pub use tenant::TenantAuth;

use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub auth_clients: ServerClientFactory,
    pub users: Arc<dyn UserStore>,
    pub tenants: TenantAuth,
}

impl AppState {
    pub fn new(config: Config, auth_clients: ServerClientFactory, stores: Stores) -> Result<Self, ::config::ConfigError> {
        let secret = config
            .session_secret()
            .ok_or_else(|| ::config::ConfigError::Message("tenant session secret is not configured".to_string()))?
            .to_string();
        let tenants = TenantAuth::new(stores.tenants, &secret, config.tenant.clone());

        Ok(Self {
            config,
            auth_clients,
            users: stores.users,
            tenants,
        })
    }
}
