//! Authentication and authorization.
//!
//! Two independent checks: the session resolver asks the identity provider
//! who is calling, the permission resolver reads that caller's stored
//! permission. Session failures propagate as [`Unauthorized`]; permission
//! failures fold into `false`.

pub mod client;
pub mod context;
pub mod guard;
pub mod jwks;
pub mod permission;
pub mod provider;
pub mod remote;
pub mod session;

pub use client::{AuthClient, ServerClientFactory};
pub use context::RequestContext;
pub use guard::{RouteDecision, RouteRules};
pub use permission::is_admin_user;
pub use provider::{IdentityProvider, ProviderError};
pub use session::{get_authenticated_server_user, get_authenticated_user, Unauthorized};
