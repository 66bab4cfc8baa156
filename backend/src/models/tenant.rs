use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tenant's dashboard login, one per contractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantLogin {
    pub id: String,
    pub contractor_id: String,
    /// Lower-cased and trimmed.
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
    pub enabled: bool,
    #[serde(default, skip_serializing)]
    pub invite_token: Option<String>,
    #[serde(default)]
    pub invite_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(default)]
    pub reset_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a tenant login.
#[derive(Debug, Clone, Serialize)]
pub struct NewTenantLogin {
    pub id: String,
    pub contractor_id: String,
    pub email: String,
    pub password_hash: String,
    pub enabled: bool,
    pub invite_token: String,
    pub invite_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewTenantLogin {
    pub fn new(contractor_id: &str, email: &str, password_hash: String, invite_token: String, invite_expires_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            contractor_id: contractor_id.to_string(),
            email: normalize_email(email),
            password_hash,
            enabled: true,
            invite_token,
            invite_expires_at,
            created_at: Utc::now(),
        }
    }
}

/// Canonical form used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
