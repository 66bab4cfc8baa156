//! Tenant password hashing.

use bcrypt::{hash, verify, BcryptError};

/// Hash a password with bcrypt at `cost`, off the async runtime.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, BcryptError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash(password, cost))
        .await
        .unwrap_or_else(|e| Err(BcryptError::Io(std::io::Error::other(e.to_string()))))
}

/// Check a password against a bcrypt hash. Malformed hashes never match.
pub async fn verify_password(password: &str, password_hash: &str) -> bool {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    match tokio::task::spawn_blocking(move || verify(password, &password_hash)).await {
        Ok(Ok(valid)) => valid,
        Ok(Err(e)) => {
            tracing::warn!("Password hash could not be checked: {}", e);
            false
        }
        Err(e) => {
            tracing::error!("Password check task failed: {}", e);
            false
        }
    }
}
