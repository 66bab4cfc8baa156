//! Permission resolution: is the caller an administrator?

use crate::store::{StoreError, UserStore};

/// `true` only when the caller's single user row says `permission = "admin"`.
///
/// Fail-closed: a missing row, duplicate rows or any store failure all
/// answer `false`. Errors are logged, never returned.
pub async fn is_admin_user(store: &dyn UserStore, user_id: &str) -> bool {
    match store.fetch_permission(user_id).await {
        Ok(row) => row.grants_admin(),
        Err(StoreError::NotFound) => {
            tracing::debug!(user_id, "No user record; treating as non-admin");
            false
        }
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Permission lookup failed; treating as non-admin");
            false
        }
    }
}
