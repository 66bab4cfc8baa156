//! Configuration for the gate service.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub tenant: TenantConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// How sessions are checked against the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderMode {
    /// Ask the hosted auth API for the user behind the token.
    #[default]
    Remote,
    /// Verify the access token locally against the provider's JWKS.
    Jwks,
}

/// Identity provider connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub mode: ProviderMode,
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub url: String,
    /// Public (anon) API key sent as `apikey`.
    #[serde(default)]
    pub anon_key: String,
    /// Token issuer for JWKS mode. Defaults to `{url}/auth/v1`.
    #[serde(default)]
    pub jwt_issuer: Option<String>,
    /// Expected `aud` claim in JWKS mode. Not checked when unset.
    #[serde(default)]
    pub jwt_audience: Option<String>,
    /// Cookie holding the provider access token when no bearer header is sent.
    #[serde(default = "default_access_token_cookie")]
    pub access_token_cookie: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            mode: ProviderMode::default(),
            url: String::new(),
            anon_key: String::new(),
            jwt_issuer: None,
            jwt_audience: None,
            access_token_cookie: default_access_token_cookie(),
        }
    }
}

impl ProviderConfig {
    pub fn issuer(&self) -> String {
        self.jwt_issuer
            .clone()
            .unwrap_or_else(|| format!("{}/auth/v1", self.url.trim_end_matches('/')))
    }
}

/// Where user and tenant records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    /// Hosted database behind a PostgREST-style API.
    Rest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite database URL (sqlite backend).
    #[serde(default = "default_database_url")]
    pub url: String,
    /// REST root. Defaults to `{provider.url}/rest/v1`.
    #[serde(default)]
    pub rest_url: Option<String>,
    /// Service-role key for the REST backend.
    #[serde(default)]
    pub service_role_key: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_database_url(),
            rest_url: None,
            service_role_key: None,
        }
    }
}

/// Tenant logins and their session cookies.
#[derive(Debug, Clone, Deserialize)]
pub struct TenantConfig {
    /// HMAC secret for session tokens. Falls back to the service-role key.
    #[serde(default)]
    pub session_secret: Option<String>,
    #[serde(default = "default_session_expiry_days")]
    pub session_expiry_days: i64,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    #[serde(default = "default_invite_expiry_hours")]
    pub invite_expiry_hours: i64,
    #[serde(default = "default_reset_expiry_hours")]
    pub reset_expiry_hours: i64,
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
    /// Public origin used to build setup links.
    #[serde(default = "default_app_url")]
    pub app_url: String,
    #[serde(default = "default_setup_path")]
    pub setup_path: String,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub secure_cookies: bool,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            session_secret: None,
            session_expiry_days: default_session_expiry_days(),
            bcrypt_cost: default_bcrypt_cost(),
            invite_expiry_hours: default_invite_expiry_hours(),
            reset_expiry_hours: default_reset_expiry_hours(),
            min_password_length: default_min_password_length(),
            app_url: default_app_url(),
            setup_path: default_setup_path(),
            cookie_name: default_cookie_name(),
            secure_cookies: false,
        }
    }
}

impl TenantConfig {
    pub fn session_max_age_secs(&self) -> i64 {
        self.session_expiry_days * 24 * 60 * 60
    }
}

/// Page paths watched by the route guard.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutesConfig {
    #[serde(default = "default_protected_routes")]
    pub protected: Vec<String>,
    #[serde(default = "default_admin_prefix")]
    pub admin_prefix: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_dashboard_path")]
    pub dashboard_path: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            protected: default_protected_routes(),
            admin_prefix: default_admin_prefix(),
            login_path: default_login_path(),
            dashboard_path: default_dashboard_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated origins, or `*`.
    #[serde(default = "default_cors_origins")]
    pub origins: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: default_cors_origins(),
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_access_token_cookie() -> String {
    "sb-access-token".to_string()
}
fn default_database_url() -> String {
    "sqlite:./data/gate.db".to_string()
}
fn default_session_expiry_days() -> i64 {
    7
}
fn default_bcrypt_cost() -> u32 {
    12
}
fn default_invite_expiry_hours() -> i64 {
    168
}
fn default_reset_expiry_hours() -> i64 {
    1
}
fn default_min_password_length() -> usize {
    8
}
fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_setup_path() -> String {
    "/tenant/setup".to_string()
}
fn default_cookie_name() -> String {
    "tenant_session".to_string()
}
fn default_protected_routes() -> Vec<String> {
    vec!["/dashboard".to_string(), "/objekte".to_string()]
}
fn default_admin_prefix() -> String {
    "/admin".to_string()
}
fn default_login_path() -> String {
    "/login".to_string()
}
fn default_dashboard_path() -> String {
    "/dashboard".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_cors_origins() -> String {
    "*".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (GATE__SECTION__KEY format)
    /// 2. config.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("GATE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("routes.protected")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the service cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.url.is_empty() {
            return Err(ConfigError::Message("provider.url is required".to_string()));
        }
        if self.database.backend == StoreBackend::Rest && self.database.service_role_key.is_none() {
            return Err(ConfigError::Message(
                "database.service_role_key is required for the rest backend".to_string(),
            ));
        }
        if self.session_secret().is_none() {
            return Err(ConfigError::Message(
                "tenant.session_secret (or database.service_role_key) is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Tenant session secret, falling back to the service-role key.
    pub fn session_secret(&self) -> Option<&str> {
        self.tenant
            .session_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.database.service_role_key.as_deref())
            .filter(|s| !s.is_empty())
    }

    pub fn rest_url(&self) -> String {
        self.database
            .rest_url
            .clone()
            .unwrap_or_else(|| format!("{}/rest/v1", self.provider.url.trim_end_matches('/')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.provider.url = "https://project.example.co".to_string();
        config.tenant.session_secret = Some("secret".to_string());
        config
    }

    #[test]
    fn test_default_server_config() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);
    }

    #[test]
    fn test_default_routes_config() {
        let routes = RoutesConfig::default();
        assert_eq!(routes.protected, vec!["/dashboard", "/objekte"]);
        assert_eq!(routes.admin_prefix, "/admin");
        assert_eq!(routes.login_path, "/login");
        assert_eq!(routes.dashboard_path, "/dashboard");
    }

    #[test]
    fn test_default_tenant_config() {
        let tenant = TenantConfig::default();
        assert_eq!(tenant.session_expiry_days, 7);
        assert_eq!(tenant.session_max_age_secs(), 604_800);
        assert_eq!(tenant.bcrypt_cost, 12);
        assert_eq!(tenant.invite_expiry_hours, 168);
        assert_eq!(tenant.reset_expiry_hours, 1);
        assert_eq!(tenant.cookie_name, "tenant_session");
    }

    #[test]
    fn test_issuer_defaults_to_auth_path() {
        let mut provider = ProviderConfig::default();
        provider.url = "https://project.example.co/".to_string();
        assert_eq!(provider.issuer(), "https://project.example.co/auth/v1");

        provider.jwt_issuer = Some("https://issuer.example".to_string());
        assert_eq!(provider.issuer(), "https://issuer.example");
    }

    #[test]
    fn test_rest_url_defaults_to_provider() {
        let config = valid_config();
        assert_eq!(config.rest_url(), "https://project.example.co/rest/v1");
    }

    #[test]
    fn test_session_secret_falls_back_to_service_role_key() {
        let mut config = valid_config();
        config.tenant.session_secret = None;
        assert!(config.session_secret().is_none());

        config.database.service_role_key = Some("service-role".to_string());
        assert_eq!(config.session_secret(), Some("service-role"));
    }

    #[test]
    fn test_empty_session_secret_falls_back_to_service_role_key() {
        let mut config = valid_config();
        config.tenant.session_secret = Some(String::new());
        config.database.service_role_key = Some("service-role".to_string());
        assert_eq!(config.session_secret(), Some("service-role"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_accepts_minimal_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_provider_url() {
        let mut config = valid_config();
        config.provider.url.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_session_secret() {
        let mut config = valid_config();
        config.tenant.session_secret = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rest_backend_needs_service_role_key() {
        let mut config = valid_config();
        config.database.backend = StoreBackend::Rest;
        assert!(config.validate().is_err());

        config.database.service_role_key = Some("key".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_mode_deserializes_snake_case() {
        let mode: ProviderMode = serde_json::from_str("\"jwks\"").unwrap();
        assert_eq!(mode, ProviderMode::Jwks);
        let backend: StoreBackend = serde_json::from_str("\"rest\"").unwrap();
        assert_eq!(backend, StoreBackend::Rest);
    }
}
