//! Application user records.

use serde::{Deserialize, Serialize};

/// Permission value that grants administrative rights.
pub const ADMIN_PERMISSION: &str = "admin";

/// Projection of a `users` row onto its `permission` column.
///
/// Rows are keyed by principal ID; at most one exists per principal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PermissionRow {
    #[serde(default)]
    pub permission: Option<String>,
}

impl PermissionRow {
    pub fn new(permission: Option<&str>) -> Self {
        Self {
            permission: permission.map(String::from),
        }
    }

    /// Exact, case-sensitive match against [`ADMIN_PERMISSION`].
    pub fn grants_admin(&self) -> bool {
        self.permission.as_deref() == Some(ADMIN_PERMISSION)
    }
}
