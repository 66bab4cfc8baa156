//! tenant-gate Common Types
//!
//! Shared types used by the gate service and its clients.

pub mod principal;
pub mod session;
pub mod user;

pub use principal::Principal;
pub use session::TenantSession;
pub use user::{PermissionRow, ADMIN_PERMISSION};
