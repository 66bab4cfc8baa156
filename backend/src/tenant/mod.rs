//! Password logins for tenants, separate from the identity provider.

pub mod cookie;
pub mod password;
pub mod service;
pub mod token;

pub use cookie::{cleared_cookie, session_cookie};
pub use service::{Invitation, ResetGrant, SignedIn, TenantAuth, TenantError};
pub use token::{generate_secure_token, SessionSigner};
