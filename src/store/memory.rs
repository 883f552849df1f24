//! In-memory store used by tests and local development.
//!
//! Find-or-create runs under a single write lock, which gives the same
//! "exactly one record per subject id" guarantee the Postgres backend gets
//! from its unique indexes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{SessionInsert, SessionStore, SignupOutcome, UserRecord, UserStore};
use crate::auth::error::AuthError;
use crate::auth::federation::Provider;

struct SessionEntry {
    user_id: Uuid,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    users: Vec<UserRecord>,
    sessions: HashMap<Vec<u8>, SessionEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a user outright, leaving any sessions that point at it
    /// dangling. Maintenance escape hatch; also exercises the degraded
    /// session path.
    pub async fn remove_user(&self, id: Uuid) {
        let mut inner = self.inner.write().await;
        inner.users.retain(|user| user.id != id);
    }

    /// Number of stored user records.
    pub async fn user_count(&self) -> usize {
        self.inner.read().await.users.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AuthError> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .iter()
            .find(|user| user.username.as_deref() == Some(username))
            .cloned())
    }

    async fn insert_local(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<SignupOutcome, AuthError> {
        let mut inner = self.inner.write().await;
        if inner
            .users
            .iter()
            .any(|user| user.username.as_deref() == Some(username))
        {
            return Ok(SignupOutcome::Conflict);
        }
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: Some(username.to_string()),
            password_hash: Some(password_hash.to_string()),
            google_subject_id: None,
            facebook_subject_id: None,
            secret: None,
        };
        inner.users.push(user.clone());
        Ok(SignupOutcome::Created(user))
    }

    async fn find_or_create_by_subject(
        &self,
        provider: Provider,
        subject_id: &str,
    ) -> Result<UserRecord, AuthError> {
        let mut inner = self.inner.write().await;
        if let Some(user) = inner
            .users
            .iter()
            .find(|user| user.subject_id(provider) == Some(subject_id))
        {
            return Ok(user.clone());
        }
        let mut user = UserRecord {
            id: Uuid::new_v4(),
            username: None,
            password_hash: None,
            google_subject_id: None,
            facebook_subject_id: None,
            secret: None,
        };
        match provider {
            Provider::Google => user.google_subject_id = Some(subject_id.to_string()),
            Provider::Facebook => user.facebook_subject_id = Some(subject_id.to_string()),
        }
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn save_secret(&self, id: Uuid, secret: &str) -> Result<(), AuthError> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or(AuthError::NotFound)?;
        user.secret = Some(secret.to_string());
        Ok(())
    }

    async fn list_secrets(&self) -> Result<Vec<String>, AuthError> {
        let inner = self.inner.read().await;
        let mut secrets: Vec<String> = inner
            .users
            .iter()
            .filter_map(|user| user.secret.clone())
            .collect();
        secrets.reverse();
        Ok(secrets)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(
        &self,
        token_hash: &[u8],
        user_id: Uuid,
        ttl_seconds: i64,
    ) -> Result<SessionInsert, AuthError> {
        let mut inner = self.inner.write().await;
        if inner.sessions.contains_key(token_hash) {
            return Ok(SessionInsert::Collision);
        }
        let ttl = Duration::from_secs(ttl_seconds.max(0).unsigned_abs());
        inner.sessions.insert(
            token_hash.to_vec(),
            SessionEntry {
                user_id,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(SessionInsert::Inserted)
    }

    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<Uuid>, AuthError> {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.sessions.get(token_hash) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.user_id));
            }
        }
        // Expired entries are dropped lazily on lookup.
        inner.sessions.remove(token_hash);
        Ok(None)
    }

    async fn delete(&self, token_hash: &[u8]) -> Result<(), AuthError> {
        let mut inner = self.inner.write().await;
        inner.sessions.remove(token_hash);
        Ok(())
    }
}
