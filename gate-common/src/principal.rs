//! Authenticated identity as reported by the identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated identity behind a session.
///
/// Issued and owned by the external identity provider. The gate never mints
/// provider sessions; it only reads this record back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Provider user ID (the `sub` claim).
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Provider-level role, e.g. `authenticated`. Not an application permission.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub app_metadata: serde_json::Value,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

impl Principal {
    /// A principal with only an ID set.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            role: None,
            aud: None,
            app_metadata: serde_json::Value::Null,
            user_metadata: serde_json::Value::Null,
            last_sign_in_at: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}
