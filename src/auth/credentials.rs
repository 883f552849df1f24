//! Local username/password verification.

use std::sync::Arc;
use tracing::debug;

use super::error::AuthError;
use super::password;
use crate::store::{SignupOutcome, UserRecord, UserStore};

/// Verifies local credentials against the user store.
///
/// Held by the orchestrating state as an explicit dependency; it has no
/// global registration side effects.
#[derive(Clone)]
pub struct CredentialVerifier {
    users: Arc<dyn UserStore>,
}

impl CredentialVerifier {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Create a local account. Fails with [`AuthError::DuplicateUsername`]
    /// when the username is taken.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserRecord, AuthError> {
        let password_hash = password::hash(password.to_string()).await?;
        match self.users.insert_local(username, &password_hash).await? {
            SignupOutcome::Created(user) => {
                debug!(user_id = %user.id, "local account created");
                Ok(user)
            }
            SignupOutcome::Conflict => Err(AuthError::DuplicateUsername),
        }
    }

    /// Check a username/password pair.
    ///
    /// [`AuthError::NotFound`] when the username is unknown,
    /// [`AuthError::InvalidCredentials`] when the password does not match or
    /// the record has no local credential. Callers present both failures
    /// identically to the end user.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserRecord, AuthError> {
        let Some(user) = self.users.find_by_username(username).await? else {
            return Err(AuthError::NotFound);
        };
        let Some(stored_hash) = user.password_hash.clone() else {
            return Err(AuthError::InvalidCredentials);
        };
        if password::verify(password.to_string(), stored_hash).await? {
            Ok(user)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn verifier() -> CredentialVerifier {
        CredentialVerifier::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn register_then_authenticate_yields_same_id() {
        let verifier = verifier();
        let created = verifier.register("alice", "pw1").await.unwrap();
        let authenticated = verifier.authenticate("alice", "pw1").await.unwrap();
        assert_eq!(created.id, authenticated.id);
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let verifier = verifier();
        verifier.register("alice", "pw1").await.unwrap();
        let err = verifier.register("alice", "pw2").await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_fail() {
        let verifier = verifier();
        verifier.register("alice", "pw1").await.unwrap();

        let err = verifier.authenticate("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = verifier.authenticate("nobody", "pw1").await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }
}
