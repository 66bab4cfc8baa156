use std::sync::Arc;

use bcrypt::BcryptError;
use chrono::{DateTime, Duration, Utc};
use gate_common::TenantSession;
use serde::Serialize;

use crate::config::TenantConfig;
use crate::models::{normalize_email, NewTenantLogin, TenantLogin};
use crate::store::{OneTimeToken, StoreError, TenantKey, TenantStore, TenantUpdate};

use super::password::{hash_password, verify_password};
use super::token::{generate_secure_token, is_live, token_expiry, SessionSigner, TOKEN_BYTES};

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Email and password are required")]
    MissingCredentials,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account disabled. Please contact your landlord.")]
    AccountDisabled,
    #[error("Password setup required")]
    PasswordNotSet,
    #[error("Token and password are required")]
    MissingToken,
    #[error("Password must be at least {0} characters long")]
    PasswordTooShort(usize),
    #[error("Invalid or expired link")]
    InvalidLink,
    #[error("contractor_id is required")]
    MissingContractor,
    #[error("Valid email is required")]
    InvalidEmail,
    #[error("Tenant already has a login record")]
    AlreadyInvited,
    #[error("Email is already registered")]
    EmailTaken,
    #[error("Tenant login not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Password hashing failed: {0}")]
    Hashing(#[from] BcryptError),
    #[error("Session signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// A tenant that just proved their identity, with a fresh session token.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub tenant: TenantLogin,
    pub session_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Invitation {
    pub tenant_login_id: String,
    pub invite_token: String,
    pub invite_expires_at: DateTime<Utc>,
    pub setup_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetGrant {
    pub reset_token: String,
    pub reset_expires_at: DateTime<Utc>,
}

/// Tenant login flows on top of a [`TenantStore`].
pub struct TenantAuth {
    store: Arc<dyn TenantStore>,
    signer: SessionSigner,
    config: TenantConfig,
}

impl TenantAuth {
    pub fn new(store: Arc<dyn TenantStore>, secret: &str, config: TenantConfig) -> Self {
        let signer = SessionSigner::new(secret, Duration::days(config.session_expiry_days));
        Self { store, signer, config }
    }

    /// Decode a session cookie value and check the login still exists and
    /// is enabled. Store failures count as no session.
    pub async fn verify_session(&self, token: &str) -> Option<TenantSession> {
        let session = self.signer.verify(token)?;

        match self.store.find_tenant(TenantKey::Id(&session.tenant_id)).await {
            Ok(Some(tenant)) if tenant.enabled => Some(session),
            Ok(Some(_)) => {
                tracing::debug!(tenant_id = %session.tenant_id, "Session of disabled tenant rejected");
                None
            }
            Ok(None) => {
                tracing::debug!(tenant_id = %session.tenant_id, "Session of deleted tenant rejected");
                None
            }
            Err(e) => {
                tracing::warn!(tenant_id = %session.tenant_id, "Session check failed: {}", e);
                None
            }
        }
    }

    /// E-mail + password login.
    ///
    /// Unknown e-mail and wrong password fail identically.
    pub async fn login(&self, email: &str, password: &str) -> Result<SignedIn, TenantError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(TenantError::MissingCredentials);
        }

        let tenant = self
            .store
            .find_tenant(TenantKey::Email(&normalize_email(email)))
            .await?
            .ok_or(TenantError::InvalidCredentials)?;

        if !tenant.enabled {
            return Err(TenantError::AccountDisabled);
        }

        let Some(password_hash) = tenant.password_hash.as_deref() else {
            return Err(TenantError::PasswordNotSet);
        };

        if !verify_password(password, password_hash).await {
            tracing::info!(tenant_id = %tenant.id, "Tenant login failed: wrong password");
            return Err(TenantError::InvalidCredentials);
        }

        self.sign_in(tenant).await
    }

    /// First password for an invited tenant. Logs the tenant in.
    pub async fn setup_password(&self, invite_token: &str, password: &str) -> Result<SignedIn, TenantError> {
        self.check_new_password(invite_token, password)?;

        let tenant = self
            .store
            .find_tenant(TenantKey::InviteToken(invite_token))
            .await?
            .filter(|t| is_live(t.invite_expires_at))
            .ok_or(TenantError::InvalidLink)?;

        self.replace_password(tenant, password, TenantUpdate {
            require_token: Some(OneTimeToken::Invite(invite_token.to_string())),
            clear_invite: true,
            ..Default::default()
        })
        .await
    }

    /// New password via a reset token. Logs the tenant in.
    pub async fn reset_password(&self, reset_token: &str, password: &str) -> Result<SignedIn, TenantError> {
        self.check_new_password(reset_token, password)?;

        let tenant = self
            .store
            .find_tenant(TenantKey::ResetToken(reset_token))
            .await?
            .filter(|t| is_live(t.reset_expires_at))
            .ok_or(TenantError::InvalidLink)?;

        self.replace_password(tenant, password, TenantUpdate {
            require_token: Some(OneTimeToken::Reset(reset_token.to_string())),
            clear_reset: true,
            ..Default::default()
        })
        .await
    }

    /// Create an enabled login for a contractor, pending password setup.
    ///
    /// `origin` overrides the configured app URL when building the setup link.
    pub async fn invite(&self, contractor_id: &str, email: &str, origin: Option<&str>) -> Result<Invitation, TenantError> {
        let contractor_id = contractor_id.trim();
        if contractor_id.is_empty() {
            return Err(TenantError::MissingContractor);
        }
        if !email.contains('@') {
            return Err(TenantError::InvalidEmail);
        }

        if self.store.find_tenant(TenantKey::ContractorId(contractor_id)).await?.is_some() {
            return Err(TenantError::AlreadyInvited);
        }
        let email = normalize_email(email);
        if self.store.find_tenant(TenantKey::Email(&email)).await?.is_some() {
            return Err(TenantError::EmailTaken);
        }

        let invite_token = generate_secure_token(TOKEN_BYTES);
        let invite_expires_at = token_expiry(self.config.invite_expiry_hours);

        // Unusable until setup replaces it.
        let placeholder = hash_password(&generate_secure_token(TOKEN_BYTES), self.config.bcrypt_cost).await?;

        let login = NewTenantLogin::new(contractor_id, &email, placeholder, invite_token.clone(), invite_expires_at);
        let created = self.store.insert_tenant(&login).await?;

        let base = origin.unwrap_or(&self.config.app_url).trim_end_matches('/');
        let setup_url = format!("{}{}?token={}", base, self.config.setup_path, invite_token);

        tracing::info!(tenant_id = %created.id, contractor_id, "Invited tenant");

        Ok(Invitation {
            tenant_login_id: created.id,
            invite_token,
            invite_expires_at,
            setup_url,
        })
    }

    pub async fn set_enabled(&self, tenant_id: &str, enabled: bool) -> Result<(), TenantError> {
        let update = TenantUpdate {
            enabled: Some(enabled),
            ..Default::default()
        };
        if !self.store.update_tenant(tenant_id, &update).await? {
            return Err(TenantError::NotFound);
        }
        tracing::info!(tenant_id, enabled, "Tenant access changed");
        Ok(())
    }

    pub async fn issue_reset_token(&self, tenant_id: &str) -> Result<ResetGrant, TenantError> {
        let reset_token = generate_secure_token(TOKEN_BYTES);
        let reset_expires_at = token_expiry(self.config.reset_expiry_hours);

        let update = TenantUpdate {
            reset: Some((reset_token.clone(), reset_expires_at)),
            ..Default::default()
        };
        if !self.store.update_tenant(tenant_id, &update).await? {
            return Err(TenantError::NotFound);
        }
        tracing::info!(tenant_id, "Issued tenant reset token");

        Ok(ResetGrant {
            reset_token,
            reset_expires_at,
        })
    }

    fn check_new_password(&self, token: &str, password: &str) -> Result<(), TenantError> {
        if token.is_empty() || password.is_empty() {
            return Err(TenantError::MissingToken);
        }
        if password.chars().count() < self.config.min_password_length {
            return Err(TenantError::PasswordTooShort(self.config.min_password_length));
        }
        Ok(())
    }

    async fn replace_password(&self, tenant: TenantLogin, password: &str, mut update: TenantUpdate) -> Result<SignedIn, TenantError> {
        if !tenant.enabled {
            return Err(TenantError::AccountDisabled);
        }

        let password_hash = hash_password(password, self.config.bcrypt_cost).await?;
        update.password_hash = Some(password_hash.clone());
        if !self.store.update_tenant(&tenant.id, &update).await? {
            return Err(TenantError::InvalidLink);
        }

        let mut tenant = tenant;
        tenant.password_hash = Some(password_hash);
        if update.clear_invite {
            tenant.invite_token = None;
            tenant.invite_expires_at = None;
        }
        if update.clear_reset {
            tenant.reset_token = None;
            tenant.reset_expires_at = None;
        }
        self.sign_in(tenant).await
    }

    async fn sign_in(&self, mut tenant: TenantLogin) -> Result<SignedIn, TenantError> {
        let session_token = self.signer.create(&tenant)?;

        let now = Utc::now();
        let touch = TenantUpdate {
            last_login_at: Some(now),
            ..Default::default()
        };
        match self.store.update_tenant(&tenant.id, &touch).await {
            Ok(_) => tenant.last_login_at = Some(now),
            Err(e) => tracing::warn!(tenant_id = %tenant.id, "Could not record last login: {}", e),
        }

        tracing::info!(tenant_id = %tenant.id, "Tenant signed in");
        Ok(SignedIn {
            tenant,
            session_token,
        })
    }
}
