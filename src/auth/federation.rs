//! Federated identity resolution.
//!
//! The provider set is closed: adding a provider means a new [`Provider`]
//! variant, a user-store column, and an endpoint entry in the OAuth module,
//! not a runtime registry entry.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::error::AuthError;
use crate::store::{UserRecord, UserStore};

/// The supported identity federations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Google,
    Facebook,
}

impl Provider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a provider-verified subject id to a local user record.
///
/// The resolver trusts its caller: it only ever runs after the provider's
/// authorization-code exchange has produced a verified subject id.
#[derive(Clone)]
pub struct FederationResolver {
    users: Arc<dyn UserStore>,
}

impl FederationResolver {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Find-or-create the record for `(provider, subject_id)`.
    ///
    /// Idempotent; concurrent first sightings converge on one record because
    /// the store's insert path is atomic (unique index + re-read on
    /// violation).
    pub async fn resolve(
        &self,
        provider: Provider,
        subject_id: &str,
    ) -> Result<UserRecord, AuthError> {
        let user = self
            .users
            .find_or_create_by_subject(provider, subject_id)
            .await?;
        debug!(user_id = %user.id, %provider, "federated identity resolved");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn resolve_is_idempotent() {
        let resolver = FederationResolver::new(Arc::new(MemoryStore::new()));
        let first = resolver.resolve(Provider::Google, "subject-a").await.unwrap();
        let second = resolver.resolve(Provider::Google, "subject-a").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn providers_never_merge() {
        let resolver = FederationResolver::new(Arc::new(MemoryStore::new()));
        let google = resolver.resolve(Provider::Google, "subject-a").await.unwrap();
        let facebook = resolver
            .resolve(Provider::Facebook, "subject-a")
            .await
            .unwrap();
        assert_ne!(google.id, facebook.id);
        assert_eq!(google.subject_id(Provider::Google), Some("subject-a"));
        assert_eq!(facebook.subject_id(Provider::Facebook), Some("subject-a"));
    }

    #[tokio::test]
    async fn concurrent_first_sightings_create_one_record() {
        let store = Arc::new(MemoryStore::new());
        let resolver = FederationResolver::new(store.clone());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move {
                resolver.resolve(Provider::Google, "fresh-subject").await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.user_count().await, 1);
    }
}
