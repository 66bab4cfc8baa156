pub mod tenant;

pub use tenant::{normalize_email, NewTenantLogin, TenantLogin};
