//! Persistence seams for user and tenant records.

pub mod rest;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gate_common::PermissionRow;

use crate::config::{Config, StoreBackend};
use crate::models::{NewTenantLogin, TenantLogin};

pub use rest::RestStore;
pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No matching row")]
    NotFound,
    #[error("Expected one row, found {0}")]
    MultipleRows(usize),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Store unreachable: {0}")]
    Transport(String),
    #[error("Store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Malformed store response: {0}")]
    Decode(String),
}

/// Collapse a query result into the single expected row.
pub(crate) fn single<T>(mut rows: Vec<T>) -> Result<T, StoreError> {
    match rows.len() {
        0 => Err(StoreError::NotFound),
        1 => Ok(rows.remove(0)),
        n => Err(StoreError::MultipleRows(n)),
    }
}

/// Zero or one row; more is an error.
pub(crate) fn optional<T>(rows: Vec<T>) -> Result<Option<T>, StoreError> {
    match single(rows) {
        Ok(row) => Ok(Some(row)),
        Err(StoreError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Read access to the `users` table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// `permission` of the single user row with `id = user_id`.
    async fn fetch_permission(&self, user_id: &str) -> Result<PermissionRow, StoreError>;
}

/// Which tenant lookup key to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantKey<'a> {
    Id(&'a str),
    Email(&'a str),
    ContractorId(&'a str),
    InviteToken(&'a str),
    ResetToken(&'a str),
}

impl<'a> TenantKey<'a> {
    pub fn column(&self) -> &'static str {
        match self {
            TenantKey::Id(_) => "id",
            TenantKey::Email(_) => "email",
            TenantKey::ContractorId(_) => "contractor_id",
            TenantKey::InviteToken(_) => "invite_token",
            TenantKey::ResetToken(_) => "reset_token",
        }
    }

    pub fn value(&self) -> &'a str {
        match self {
            TenantKey::Id(v)
            | TenantKey::Email(v)
            | TenantKey::ContractorId(v)
            | TenantKey::InviteToken(v)
            | TenantKey::ResetToken(v) => v,
        }
    }
}

/// A one-time token the row must still hold for an update to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OneTimeToken {
    Invite(String),
    Reset(String),
}

impl OneTimeToken {
    pub fn column(&self) -> &'static str {
        match self {
            OneTimeToken::Invite(_) => "invite_token",
            OneTimeToken::Reset(_) => "reset_token",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            OneTimeToken::Invite(v) | OneTimeToken::Reset(v) => v,
        }
    }
}

/// Field changes applied to one tenant login.
#[derive(Debug, Clone, Default)]
pub struct TenantUpdate {
    /// Apply only while the row still holds this token.
    pub require_token: Option<OneTimeToken>,
    pub password_hash: Option<String>,
    pub enabled: Option<bool>,
    pub clear_invite: bool,
    pub clear_reset: bool,
    pub reset: Option<(String, DateTime<Utc>)>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Read/write access to the `tenant_logins` table.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn find_tenant(&self, key: TenantKey<'_>) -> Result<Option<TenantLogin>, StoreError>;

    async fn insert_tenant(&self, login: &NewTenantLogin) -> Result<TenantLogin, StoreError>;

    /// Returns `false` when no login has this id, or it no longer holds
    /// `update.require_token`.
    async fn update_tenant(&self, id: &str, update: &TenantUpdate) -> Result<bool, StoreError>;
}

/// The user and tenant stores of one backend.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub tenants: Arc<dyn TenantStore>,
}

impl Stores {
    /// Serve both tables from the same backend instance.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: UserStore + TenantStore + 'static,
    {
        Self {
            users: store.clone(),
            tenants: store,
        }
    }
}

/// Open the backend selected by `config.database.backend`.
pub fn open(config: &Config) -> Result<Stores, StoreError> {
    match config.database.backend {
        StoreBackend::Sqlite => Ok(Stores::shared(Arc::new(SqliteStore::new(&config.database.url)?))),
        StoreBackend::Rest => {
            let key = config.database.service_role_key.as_deref().unwrap_or_default();
            Ok(Stores::shared(Arc::new(RestStore::new(&config.rest_url(), key))))
        }
    }
}
