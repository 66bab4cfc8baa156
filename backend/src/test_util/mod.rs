use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use gate_common::Principal;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use crate::auth::{IdentityProvider, ProviderError, ServerClientFactory};
use crate::config::Config;
use crate::store::{SqliteStore, Stores};
use crate::AppState;

pub const TEST_KID: &str = "test-key-1";

const TEST_RSA_PEM: &str = include_str!("test_rsa.pem");

/// Base64url modulus of `test_rsa.pem`.
const TEST_RSA_N: &str = "qee7R4bFFjGMx2nBTHa-Zc2yqYKAkF-StBoQZRnfS2a6D4rKQBhKSvhn8IOBJftlBeFQ4RRpQKJ8-yAIxDnNl9W8z3ukRBU-bneVZgAayCj23J9NzUJ2Y9Wz6wxnZRRFPmVX53MwcJudvErmFE2ki2xfL3P8sJdTeOizx992mFUi860OSiY805jl8stERX1SiYtj_8_4DdHtWfeTNH1fU_ZVBY6f93x817x6SOrt3qed3SDXeLFV3Jj3lHOtsVzZFCsUVJ71gPrXOlMwjjFhh7oWQSRUzbXAh_m3aCAPSibobvG7gYh_ezRIFcrt8er3zgNUUtylliXj4GGCSRsl3Q";
const TEST_RSA_E: &str = "AQAB";

enum Behavior {
    User(Principal),
    NoUser,
    Failing(fn() -> ProviderError),
    ByToken(HashMap<String, String>),
}

/// Identity provider with canned answers. Counts how often it is asked.
pub struct StaticProvider {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl StaticProvider {
    fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns `principal` for any token; no token is a missing session.
    pub fn user(principal: Principal) -> Self {
        Self::with(Behavior::User(principal))
    }

    pub fn no_user() -> Self {
        Self::with(Behavior::NoUser)
    }

    pub fn failing(error: fn() -> ProviderError) -> Self {
        Self::with(Behavior::Failing(error))
    }

    /// Maps access tokens to user ids. Unknown tokens have no user.
    pub fn by_token(pairs: &[(&str, &str)]) -> Self {
        let map = pairs
            .iter()
            .map(|(token, id)| (token.to_string(), id.to_string()))
            .collect();
        Self::with(Behavior::ByToken(map))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for StaticProvider {
    async fn get_user(&self, access_token: Option<&str>) -> Result<Option<Principal>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::User(principal) => match access_token {
                Some(_) => Ok(Some(principal.clone())),
                None => Err(ProviderError::SessionMissing),
            },
            Behavior::NoUser => Ok(None),
            Behavior::Failing(error) => Err(error()),
            Behavior::ByToken(map) => {
                let token = access_token.ok_or(ProviderError::SessionMissing)?;
                Ok(map.get(token).map(|id| Principal::new(id.clone())))
            }
        }
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.provider.url = "http://127.0.0.1:9".to_string();
    config.provider.anon_key = "anon".to_string();
    config.database.url = "sqlite::memory:".to_string();
    config.tenant.session_secret = Some("test-session-secret".to_string());
    config.tenant.bcrypt_cost = 4;
    config.logging.level = "debug".to_string();
    config
}

/// App state over an in-memory database and `provider`.
///
/// The store is returned too so tests can seed users and tenants.
pub fn create_test_state(provider: Arc<dyn IdentityProvider>) -> (Arc<AppState>, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::new(":memory:").expect("in-memory sqlite"));
    let state = AppState::new(
        test_config(),
        ServerClientFactory::from_provider(provider),
        Stores::shared(store.clone()),
    )
    .expect("test config has a session secret");
    (Arc::new(state), store)
}

pub fn test_signing_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(TEST_RSA_PEM.as_bytes()).expect("valid test key")
}

/// JWKS document publishing the test key under [`TEST_KID`].
pub fn test_jwks() -> serde_json::Value {
    serde_json::json!({
        "keys": [{
            "kid": TEST_KID,
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": TEST_RSA_N,
            "e": TEST_RSA_E,
        }]
    })
}

/// Serve OIDC discovery and [`test_jwks`] from `server`.
#[cfg(test)]
pub async fn mount_jwks(server: &wiremock::MockServer) {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issuer": server.uri(),
            "jwks_uri": format!("{}/.well-known/jwks.json", server.uri()),
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_jwks()))
        .mount(server)
        .await;
}

#[derive(serde::Serialize)]
struct TestClaims {
    sub: String,
    email: Option<String>,
    role: String,
    aud: String,
    iss: String,
    exp: u64,
    iat: u64,
}

/// An access token shaped like the hosted auth service issues them.
pub fn generate_test_jwt(
    issuer: &str,
    user_id: &str,
    email: Option<&str>,
    kid: &str,
    signing_key: &EncodingKey,
) -> String {
    let now = Utc::now();
    let claims = TestClaims {
        sub: user_id.to_string(),
        email: email.map(String::from),
        role: "authenticated".to_string(),
        aud: "authenticated".to_string(),
        iss: issuer.to_string(),
        exp: (now + Duration::hours(1)).timestamp() as u64,
        iat: now.timestamp() as u64,
    };

    let header = Header {
        alg: Algorithm::RS256,
        kid: Some(kid.to_string()),
        ..Default::default()
    };

    encode(&header, &claims, signing_key).expect("Failed to encode JWT")
}
