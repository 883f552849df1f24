//! Postgres-backed store (sqlx).
//!
//! Uniqueness lives in the schema (`sql/schema.sql`); this module maps
//! SQLSTATE 23505 back into the domain outcomes instead of surfacing it.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::{SessionInsert, SessionStore, SignupOutcome, UserRecord, UserStore};
use crate::auth::error::AuthError;
use crate::auth::federation::Provider;

const USER_COLUMNS: &str =
    "id, username, password_hash, google_subject_id, facebook_subject_id, secret";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_subject(
        &self,
        provider: Provider,
        subject_id: &str,
    ) -> Result<Option<UserRecord>, AuthError> {
        let query = match provider {
            Provider::Google => {
                "SELECT id, username, password_hash, google_subject_id, facebook_subject_id, secret \
                 FROM users WHERE google_subject_id = $1"
            }
            Provider::Facebook => {
                "SELECT id, username, password_hash, google_subject_id, facebook_subject_id, secret \
                 FROM users WHERE facebook_subject_id = $1"
            }
        };
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(subject_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by subject id")
            .map_err(AuthError::Storage)?;
        Ok(row.map(|row| row_to_user(&row)))
    }

    async fn insert_by_subject(
        &self,
        provider: Provider,
        subject_id: &str,
    ) -> Result<Option<UserRecord>, AuthError> {
        let query = match provider {
            Provider::Google => {
                "INSERT INTO users (google_subject_id) VALUES ($1) \
                 RETURNING id, username, password_hash, google_subject_id, facebook_subject_id, secret"
            }
            Provider::Facebook => {
                "INSERT INTO users (facebook_subject_id) VALUES ($1) \
                 RETURNING id, username, password_hash, google_subject_id, facebook_subject_id, secret"
            }
        };
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(subject_id)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;
        match row {
            Ok(row) => Ok(Some(row_to_user(&row))),
            // Lost the race: the row now exists, the caller re-reads it.
            Err(err) if is_unique_violation(&err) => Ok(None),
            Err(err) => Err(AuthError::Storage(
                anyhow::Error::new(err).context("failed to insert federated user"),
            )),
        }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AuthError> {
        let query = user_query("WHERE id = $1");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by id")
            .map_err(AuthError::Storage)?;
        Ok(row.map(|row| row_to_user(&row)))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError> {
        let query = user_query("WHERE username = $1");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by username")
            .map_err(AuthError::Storage)?;
        Ok(row.map(|row| row_to_user(&row)))
    }

    async fn insert_local(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<SignupOutcome, AuthError> {
        let query = "INSERT INTO users (username, password_hash) VALUES ($1, $2) \
                     RETURNING id, username, password_hash, google_subject_id, facebook_subject_id, secret";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;
        match row {
            Ok(row) => Ok(SignupOutcome::Created(row_to_user(&row))),
            Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
            Err(err) => Err(AuthError::Storage(
                anyhow::Error::new(err).context("failed to insert user"),
            )),
        }
    }

    async fn find_or_create_by_subject(
        &self,
        provider: Provider,
        subject_id: &str,
    ) -> Result<UserRecord, AuthError> {
        // Two rounds: lookup, insert, and on a lost insert race one final
        // lookup that must succeed.
        for _ in 0..2 {
            if let Some(user) = self.find_by_subject(provider, subject_id).await? {
                return Ok(user);
            }
            if let Some(user) = self.insert_by_subject(provider, subject_id).await? {
                return Ok(user);
            }
        }
        Err(AuthError::Storage(anyhow::anyhow!(
            "user for {provider} subject disappeared between insert and re-read"
        )))
    }

    async fn save_secret(&self, id: Uuid, secret: &str) -> Result<(), AuthError> {
        let query = "UPDATE users SET secret = $2, updated_at = NOW() WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(secret)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to save secret")
            .map_err(AuthError::Storage)?;
        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    async fn list_secrets(&self) -> Result<Vec<String>, AuthError> {
        let query =
            "SELECT secret FROM users WHERE secret IS NOT NULL ORDER BY updated_at DESC";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list secrets")
            .map_err(AuthError::Storage)?;
        Ok(rows.iter().map(|row| row.get("secret")).collect())
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert(
        &self,
        token_hash: &[u8],
        user_id: Uuid,
        ttl_seconds: i64,
    ) -> Result<SessionInsert, AuthError> {
        let query = "INSERT INTO user_sessions (session_hash, user_id, expires_at) \
                     VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(token_hash)
            .bind(user_id)
            .bind(ttl_seconds)
            .execute(&self.pool)
            .instrument(span)
            .await;
        match result {
            Ok(_) => Ok(SessionInsert::Inserted),
            Err(err) if is_unique_violation(&err) => Ok(SessionInsert::Collision),
            Err(err) => Err(AuthError::Storage(
                anyhow::Error::new(err).context("failed to insert session"),
            )),
        }
    }

    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<Uuid>, AuthError> {
        let query = "SELECT user_id FROM user_sessions \
                     WHERE session_hash = $1 AND expires_at > NOW()";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")
            .map_err(AuthError::Storage)?;
        Ok(row.map(|row| row.get("user_id")))
    }

    async fn delete(&self, token_hash: &[u8]) -> Result<(), AuthError> {
        let query = "DELETE FROM user_sessions WHERE session_hash = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")
            .map_err(AuthError::Storage)?;
        Ok(())
    }
}

fn user_query(filter: &str) -> String {
    format!("SELECT {USER_COLUMNS} FROM users {filter}")
}

fn row_to_user(row: &PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        google_subject_id: row.get("google_subject_id"),
        facebook_subject_id: row.get("facebook_subject_id"),
        secret: row.get("secret"),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn user_query_carries_filter() {
        let query = user_query("WHERE id = $1");
        assert!(query.starts_with("SELECT id, username"));
        assert!(query.ends_with("WHERE id = $1"));
    }
}
