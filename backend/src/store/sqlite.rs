use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gate_common::PermissionRow;
use rusqlite::{params, Connection, Row};

use crate::models::{NewTenantLogin, TenantLogin};

use super::{optional, single, OneTimeToken, StoreError, TenantKey, TenantStore, TenantUpdate, UserStore};

const TENANT_COLUMNS: &str = "id, contractor_id, email, password_hash, enabled, invite_token, \
     invite_expires_at, reset_token, reset_expires_at, last_login_at, created_at";

/// SQLite-backed user and tenant store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn db_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::DatabaseError(e.to_string())
}

fn parse_ts(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn tenant_from_row(row: &Row<'_>) -> rusqlite::Result<TenantLogin> {
    Ok(TenantLogin {
        id: row.get(0)?,
        contractor_id: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        enabled: row.get::<_, i32>(4)? != 0,
        invite_token: row.get(5)?,
        invite_expires_at: parse_ts(row.get(6)?),
        reset_token: row.get(7)?,
        reset_expires_at: parse_ts(row.get(8)?),
        last_login_at: parse_ts(row.get(9)?),
        created_at: parse_ts(row.get(10)?).unwrap_or_else(Utc::now),
    })
}

impl SqliteStore {
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        // Parse sqlite: prefix if present
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::IoError(e.to_string()))?;
            }
        }

        let conn = Connection::open(path).map_err(db_err)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT,
                permission TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        ).map_err(db_err)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS tenant_logins (
                id TEXT PRIMARY KEY,
                contractor_id TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT,
                enabled INTEGER NOT NULL DEFAULT 1,
                invite_token TEXT,
                invite_expires_at TEXT,
                reset_token TEXT,
                reset_expires_at TEXT,
                last_login_at TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        ).map_err(db_err)?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tenant_logins_invite_token ON tenant_logins(invite_token)",
            [],
        ).map_err(db_err)?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tenant_logins_reset_token ON tenant_logins(reset_token)",
            [],
        ).map_err(db_err)?;

        tracing::info!("Record store initialized with database: {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create or replace a user row. Provisioning helper; the gate itself only reads users.
    pub fn upsert_user(&self, user_id: &str, email: Option<&str>, permission: Option<&str>) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(db_err)?;

        conn.execute(
            "INSERT INTO users (id, email, permission, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET email = excluded.email, permission = excluded.permission",
            params![user_id, email, permission, Utc::now().to_rfc3339()],
        ).map_err(db_err)?;

        tracing::debug!("Upserted user {} (permission: {:?})", user_id, permission);
        Ok(())
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn fetch_permission(&self, user_id: &str) -> Result<PermissionRow, StoreError> {
        let conn = self.conn.lock().map_err(db_err)?;

        let mut stmt = conn
            .prepare("SELECT permission FROM users WHERE id = ?1")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![user_id], |row| Ok(PermissionRow { permission: row.get(0)? }))
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        single(rows)
    }
}

#[async_trait]
impl TenantStore for SqliteStore {
    async fn find_tenant(&self, key: TenantKey<'_>) -> Result<Option<TenantLogin>, StoreError> {
        let conn = self.conn.lock().map_err(db_err)?;

        let sql = format!("SELECT {} FROM tenant_logins WHERE {} = ?1", TENANT_COLUMNS, key.column());
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params![key.value()], tenant_from_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        optional(rows)
    }

    async fn insert_tenant(&self, login: &NewTenantLogin) -> Result<TenantLogin, StoreError> {
        let conn = self.conn.lock().map_err(db_err)?;

        conn.execute(
            "INSERT INTO tenant_logins (id, contractor_id, email, password_hash, enabled, invite_token, invite_expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                login.id,
                login.contractor_id,
                login.email,
                login.password_hash,
                login.enabled,
                login.invite_token,
                login.invite_expires_at.to_rfc3339(),
                login.created_at.to_rfc3339(),
            ],
        ).map_err(db_err)?;

        tracing::info!("Created tenant login {} for contractor {}", login.id, login.contractor_id);

        Ok(TenantLogin {
            id: login.id.clone(),
            contractor_id: login.contractor_id.clone(),
            email: login.email.clone(),
            password_hash: Some(login.password_hash.clone()),
            enabled: login.enabled,
            invite_token: Some(login.invite_token.clone()),
            invite_expires_at: Some(login.invite_expires_at),
            reset_token: None,
            reset_expires_at: None,
            last_login_at: None,
            created_at: login.created_at,
        })
    }

    async fn update_tenant(&self, id: &str, update: &TenantUpdate) -> Result<bool, StoreError> {
        let conn = self.conn.lock().map_err(db_err)?;

        let (reset_token, reset_expires_at) = match &update.reset {
            Some((token, expires)) => (Some(token.as_str()), Some(expires.to_rfc3339())),
            None => (None, None),
        };

        let (invite_guard, reset_guard) = match &update.require_token {
            Some(OneTimeToken::Invite(token)) => (Some(token.as_str()), None),
            Some(OneTimeToken::Reset(token)) => (None, Some(token.as_str())),
            None => (None, None),
        };

        let changed = conn.execute(
            "UPDATE tenant_logins SET
                password_hash = COALESCE(?2, password_hash),
                enabled = COALESCE(?3, enabled),
                invite_token = CASE WHEN ?4 THEN NULL ELSE invite_token END,
                invite_expires_at = CASE WHEN ?4 THEN NULL ELSE invite_expires_at END,
                reset_token = CASE WHEN ?5 THEN NULL ELSE COALESCE(?6, reset_token) END,
                reset_expires_at = CASE WHEN ?5 THEN NULL ELSE COALESCE(?7, reset_expires_at) END,
                last_login_at = COALESCE(?8, last_login_at)
             WHERE id = ?1
               AND (?9 IS NULL OR invite_token = ?9)
               AND (?10 IS NULL OR reset_token = ?10)",
            params![
                id,
                update.password_hash,
                update.enabled,
                update.clear_invite,
                update.clear_reset,
                reset_token,
                reset_expires_at,
                update.last_login_at.map(|t| t.to_rfc3339()),
                invite_guard,
                reset_guard,
            ],
        ).map_err(db_err)?;

        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_login(contractor_id: &str, email: &str) -> NewTenantLogin {
        NewTenantLogin::new(
            contractor_id,
            email,
            "placeholder-hash".to_string(),
            format!("invite-{}", contractor_id),
            Utc::now() + Duration::hours(168),
        )
    }

    #[tokio::test]
    async fn test_fetch_permission() {
        let store = SqliteStore::new(":memory:").unwrap();
        store.upsert_user("u1", Some("u1@example.com"), Some("admin")).unwrap();

        let row = store.fetch_permission("u1").await.unwrap();
        assert_eq!(row.permission.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_fetch_permission_missing_row() {
        let store = SqliteStore::new(":memory:").unwrap();
        let err = store.fetch_permission("nobody").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_upsert_replaces_permission() {
        let store = SqliteStore::new(":memory:").unwrap();
        store.upsert_user("u1", None, Some("admin")).unwrap();
        store.upsert_user("u1", None, Some("member")).unwrap();

        let row = store.fetch_permission("u1").await.unwrap();
        assert_eq!(row.permission.as_deref(), Some("member"));
    }

    #[tokio::test]
    async fn test_insert_and_find_tenant_by_each_key() {
        let store = SqliteStore::new(":memory:").unwrap();
        let created = store.insert_tenant(&new_login("c1", "Mieter@Example.com")).await.unwrap();
        assert_eq!(created.email, "mieter@example.com");

        for key in [
            TenantKey::Id(&created.id),
            TenantKey::Email("mieter@example.com"),
            TenantKey::ContractorId("c1"),
            TenantKey::InviteToken("invite-c1"),
        ] {
            let found = store.find_tenant(key).await.unwrap().unwrap();
            assert_eq!(found.id, created.id);
            assert_eq!(found.password_hash.as_deref(), Some("placeholder-hash"));
            assert!(found.invite_expires_at.is_some());
        }

        assert!(store.find_tenant(TenantKey::ResetToken("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_contractor_is_rejected() {
        let store = SqliteStore::new(":memory:").unwrap();
        store.insert_tenant(&new_login("c1", "a@example.com")).await.unwrap();

        let err = store.insert_tenant(&new_login("c1", "b@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DatabaseError(_)));
    }

    #[tokio::test]
    async fn test_update_password_clears_invite() {
        let store = SqliteStore::new(":memory:").unwrap();
        let created = store.insert_tenant(&new_login("c1", "a@example.com")).await.unwrap();

        let update = TenantUpdate {
            password_hash: Some("new-hash".to_string()),
            clear_invite: true,
            ..Default::default()
        };
        assert!(store.update_tenant(&created.id, &update).await.unwrap());

        let found = store.find_tenant(TenantKey::Id(&created.id)).await.unwrap().unwrap();
        assert_eq!(found.password_hash.as_deref(), Some("new-hash"));
        assert!(found.invite_token.is_none());
        assert!(found.invite_expires_at.is_none());
        assert!(found.enabled);
    }

    #[tokio::test]
    async fn test_set_and_clear_reset_token() {
        let store = SqliteStore::new(":memory:").unwrap();
        let created = store.insert_tenant(&new_login("c1", "a@example.com")).await.unwrap();
        let expires = Utc::now() + Duration::hours(1);

        let set = TenantUpdate {
            reset: Some(("reset-1".to_string(), expires)),
            ..Default::default()
        };
        store.update_tenant(&created.id, &set).await.unwrap();
        let found = store.find_tenant(TenantKey::ResetToken("reset-1")).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(found.reset_expires_at.is_some());

        let clear = TenantUpdate {
            clear_reset: true,
            ..Default::default()
        };
        store.update_tenant(&created.id, &clear).await.unwrap();
        assert!(store.find_tenant(TenantKey::ResetToken("reset-1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_toggle_enabled_and_last_login() {
        let store = SqliteStore::new(":memory:").unwrap();
        let created = store.insert_tenant(&new_login("c1", "a@example.com")).await.unwrap();

        let update = TenantUpdate {
            enabled: Some(false),
            last_login_at: Some(Utc::now()),
            ..Default::default()
        };
        store.update_tenant(&created.id, &update).await.unwrap();

        let found = store.find_tenant(TenantKey::Id(&created.id)).await.unwrap().unwrap();
        assert!(!found.enabled);
        assert!(found.last_login_at.is_some());
        assert_eq!(found.invite_token.as_deref(), Some("invite-c1"));
    }

    #[tokio::test]
    async fn test_required_token_is_single_use() {
        let store = SqliteStore::new(":memory:").unwrap();
        let created = store.insert_tenant(&new_login("c1", "a@example.com")).await.unwrap();

        let consume = TenantUpdate {
            require_token: Some(OneTimeToken::Invite("invite-c1".to_string())),
            password_hash: Some("first".to_string()),
            clear_invite: true,
            ..Default::default()
        };
        assert!(store.update_tenant(&created.id, &consume).await.unwrap());

        let replay = TenantUpdate {
            password_hash: Some("second".to_string()),
            ..consume
        };
        assert!(!store.update_tenant(&created.id, &replay).await.unwrap());

        let found = store.find_tenant(TenantKey::Id(&created.id)).await.unwrap().unwrap();
        assert_eq!(found.password_hash.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_update_unknown_id_reports_false() {
        let store = SqliteStore::new(":memory:").unwrap();
        let update = TenantUpdate {
            enabled: Some(false),
            ..Default::default()
        };
        assert!(!store.update_tenant("missing", &update).await.unwrap());
    }

    #[tokio::test]
    async fn test_on_disk_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("nested/gate.db").display());

        {
            let store = SqliteStore::new(&url).unwrap();
            store.upsert_user("u1", None, Some("admin")).unwrap();
        }

        let reopened = SqliteStore::new(&url).unwrap();
        assert!(reopened.fetch_permission("u1").await.unwrap().grants_admin());
    }
}
