//! Random tokens and signed tenant sessions.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use gate_common::TenantSession;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;

use crate::models::TenantLogin;

/// Default entropy for invite and reset tokens.
pub const TOKEN_BYTES: usize = 32;

/// URL-safe random token of `bytes` random bytes.
pub fn generate_secure_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// `hours` from now.
pub fn token_expiry(hours: i64) -> DateTime<Utc> {
    Utc::now() + Duration::hours(hours)
}

/// Whether a stored token with this expiry is still usable. No expiry means no limit.
pub fn is_live(expires_at: Option<DateTime<Utc>>) -> bool {
    expires_at.map_or(true, |at| at >= Utc::now())
}

/// Issues and checks HMAC-signed tenant session tokens.
pub struct SessionSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionSigner {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn create(&self, tenant: &TenantLogin) -> Result<String, jsonwebtoken::errors::Error> {
        self.create_expiring(tenant, Utc::now() + self.ttl)
    }

    pub fn create_expiring(&self, tenant: &TenantLogin, expires_at: DateTime<Utc>) -> Result<String, jsonwebtoken::errors::Error> {
        let session = TenantSession {
            tenant_id: tenant.id.clone(),
            email: tenant.email.clone(),
            contractor_id: tenant.contractor_id.clone(),
            exp: expires_at.timestamp().max(0) as u64,
        };
        encode(&Header::new(Algorithm::HS256), &session, &self.encoding)
    }

    /// `None` for anything but an intact, unexpired token signed with our secret.
    pub fn verify(&self, token: &str) -> Option<TenantSession> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match decode::<TenantSession>(token, &self.decoding, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!("Rejected tenant session: {}", e);
                None
            }
        }
    }
}
