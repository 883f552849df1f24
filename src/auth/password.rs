//! Argon2id password hashing.
//!
//! Hashes are PHC-format strings with an embedded per-record random salt.
//! Both operations are CPU-bound and run on the blocking pool so a slow hash
//! never stalls unrelated requests on the async executor.

use anyhow::{Context, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tokio::task;

use super::error::AuthError;

/// Hash a plaintext password. Returns a PHC-format string.
pub async fn hash(password: String) -> Result<String, AuthError> {
    task::spawn_blocking(move || hash_blocking(&password))
        .await
        .context("password hashing task failed")?
}

/// Verify a plaintext password against a stored PHC-format hash.
///
/// `Ok(false)` on mismatch; `Err` only when the stored hash is malformed.
/// The comparison inside argon2 is constant-time with respect to the
/// password content.
pub async fn verify(password: String, stored_hash: String) -> Result<bool, AuthError> {
    task::spawn_blocking(move || verify_blocking(&password, &stored_hash))
        .await
        .context("password verification task failed")?
}

fn hash_blocking(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Internal(anyhow!("failed to hash password: {err}")))
}

fn verify_blocking(password: &str, stored_hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|err| AuthError::Internal(anyhow!("malformed password hash: {err}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify_round_trip() {
        let hashed = hash("hunter2".to_string()).await.unwrap();
        assert!(hashed.starts_with("$argon2id$"));
        assert!(verify("hunter2".to_string(), hashed.clone()).await.unwrap());
        assert!(!verify("hunter3".to_string(), hashed).await.unwrap());
    }

    #[tokio::test]
    async fn same_password_hashes_differently() {
        // Per-record salts: equal inputs must not produce equal hashes.
        let first = hash("hunter2".to_string()).await.unwrap();
        let second = hash("hunter2".to_string()).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn malformed_stored_hash_is_an_error() {
        let result = verify("hunter2".to_string(), "not-a-phc-string".to_string()).await;
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }
}
