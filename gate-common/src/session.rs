//! Tenant session claims.

use serde::{Deserialize, Serialize};

/// Claims carried by a signed tenant session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantSession {
    pub tenant_id: String,
    pub email: String,
    pub contractor_id: String,
    /// Expiry as unix seconds.
    pub exp: u64,
}
