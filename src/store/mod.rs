//! Storage boundary: user records and server-side sessions.
//!
//! Two backends implement these contracts: [`postgres::PgStore`] for
//! production and [`memory::MemoryStore`] for tests and local development.
//! Uniqueness of `username` and of each provider subject id is enforced by
//! the backend, not by callers.

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::auth::federation::Provider;

pub mod memory;
pub mod postgres;

/// The persisted account entity. One row per identity; a record becomes
/// usable for login once at least one credential field is populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Assigned at creation, never changes. The only value sessions refer to.
    pub id: Uuid,
    /// Present for local accounts only; unique when present.
    pub username: Option<String>,
    /// PHC-format Argon2id string, salt embedded. Local accounts only.
    pub password_hash: Option<String>,
    pub google_subject_id: Option<String>,
    pub facebook_subject_id: Option<String>,
    pub secret: Option<String>,
}

impl UserRecord {
    /// The subject id this record holds for `provider`, if linked.
    #[must_use]
    pub fn subject_id(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Google => self.google_subject_id.as_deref(),
            Provider::Facebook => self.facebook_subject_id.as_deref(),
        }
    }
}

/// Outcome of inserting a local account.
#[derive(Debug)]
pub enum SignupOutcome {
    Created(UserRecord),
    /// The username is already taken.
    Conflict,
}

/// Outcome of inserting a session row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInsert {
    Inserted,
    /// Another session already uses this token hash; the caller generates a
    /// fresh token and retries.
    Collision,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AuthError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError>;

    /// Insert a local account. Returns [`SignupOutcome::Conflict`] when the
    /// username is taken instead of surfacing the constraint violation.
    async fn insert_local(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<SignupOutcome, AuthError>;

    /// Atomic find-or-create keyed by `(provider, subject_id)`.
    ///
    /// Concurrent first sightings of the same subject id must converge on a
    /// single record: the insert path treats a uniqueness violation as
    /// "someone else just created it" and re-reads.
    async fn find_or_create_by_subject(
        &self,
        provider: Provider,
        subject_id: &str,
    ) -> Result<UserRecord, AuthError>;

    async fn save_secret(&self, id: Uuid, secret: &str) -> Result<(), AuthError>;

    /// All stored secrets, newest first.
    async fn list_secrets(&self) -> Result<Vec<String>, AuthError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(
        &self,
        token_hash: &[u8],
        user_id: Uuid,
        ttl_seconds: i64,
    ) -> Result<SessionInsert, AuthError>;

    /// The user id a live (unexpired) session refers to, if any.
    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<Uuid>, AuthError>;

    /// Idempotent; deleting an absent session is not an error.
    async fn delete(&self, token_hash: &[u8]) -> Result<(), AuthError>;
}
