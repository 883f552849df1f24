//! Session establishment and recovery.
//!
//! The browser cookie carries a random token; the session store persists
//! only SHA-256(token) → user id with an expiry. Recovering an identity is
//! therefore one store lookup plus one user lookup, and a compromised
//! session store exposes nothing but user ids.

use anyhow::{Context, anyhow};
use axum::http::{HeaderMap, HeaderValue, header::COOKIE};
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;

use super::error::AuthError;
use super::gate::AuthSession;
use crate::store::{SessionInsert, SessionStore, UserRecord, UserStore};

pub const SESSION_COOKIE_NAME: &str = "confidant_session";

/// Issues, recovers, and revokes sessions against the session store.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    ttl_seconds: i64,
    cookie_secure: bool,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        ttl_seconds: i64,
        cookie_secure: bool,
    ) -> Self {
        Self {
            sessions,
            users,
            ttl_seconds,
            cookie_secure,
        }
    }

    /// Start a session for `user` and return the `Set-Cookie` value.
    ///
    /// Only the user's id goes into the store. Token-hash collisions retry
    /// with a fresh token.
    pub async fn establish(&self, user: &UserRecord) -> Result<HeaderValue, AuthError> {
        for _ in 0..3 {
            let token = generate_session_token()?;
            let token_hash = hash_session_token(&token);
            match self
                .sessions
                .insert(&token_hash, user.id, self.ttl_seconds)
                .await?
            {
                SessionInsert::Inserted => {
                    return session_cookie(&token, self.ttl_seconds, self.cookie_secure);
                }
                SessionInsert::Collision => {}
            }
        }
        Err(AuthError::Internal(anyhow!(
            "failed to generate a unique session token"
        )))
    }

    /// Recover the user a raw session token refers to.
    ///
    /// [`AuthError::NotFound`] when the token maps to no live session;
    /// [`AuthError::SessionUserNotFound`] when the session is live but its
    /// user has been deleted out-of-band (the dangling session is removed).
    pub async fn user_for_token(&self, token: &str) -> Result<UserRecord, AuthError> {
        let token_hash = hash_session_token(token);
        let Some(user_id) = self.sessions.lookup(&token_hash).await? else {
            return Err(AuthError::NotFound);
        };
        match self.users.find_by_id(user_id).await? {
            Some(user) => Ok(user),
            None => {
                self.sessions.delete(&token_hash).await?;
                Err(AuthError::SessionUserNotFound)
            }
        }
    }

    /// Resolve the request's session state. Absent, expired, or dangling
    /// sessions all degrade to [`AuthSession::Unauthenticated`]; only
    /// storage failures propagate.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<AuthSession, AuthError> {
        let Some(token) = extract_session_token(headers) else {
            return Ok(AuthSession::Unauthenticated);
        };
        match self.user_for_token(&token).await {
            Ok(user) => Ok(AuthSession::Authenticated(user)),
            Err(AuthError::NotFound) => Ok(AuthSession::Unauthenticated),
            Err(AuthError::SessionUserNotFound) => {
                warn!("session refers to a deleted user; treating as signed out");
                Ok(AuthSession::Unauthenticated)
            }
            Err(err) => Err(err),
        }
    }

    /// Delete the request's session, if any, and return the clearing
    /// `Set-Cookie` value. Idempotent.
    pub async fn clear(&self, headers: &HeaderMap) -> Result<HeaderValue, AuthError> {
        if let Some(token) = extract_session_token(headers) {
            let token_hash = hash_session_token(&token);
            self.sessions.delete(&token_hash).await?;
        }
        clear_session_cookie(self.cookie_secure)
    }
}

/// Random 32-byte URL-safe token. The raw value only ever lives in the
/// cookie; storage sees its hash.
fn generate_session_token() -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

fn session_cookie(token: &str, ttl_seconds: i64, secure: bool) -> Result<HeaderValue, AuthError> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|err| AuthError::Internal(anyhow!("invalid session cookie: {err}")))
}

fn clear_session_cookie(secure: bool) -> Result<HeaderValue, AuthError> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|err| AuthError::Internal(anyhow!("invalid session cookie: {err}")))
}

/// Pull the session token out of the request's `Cookie` header.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn manager(store: Arc<MemoryStore>) -> SessionManager {
        SessionManager::new(store.clone(), store, 3600, false)
    }

    fn request_headers(cookie: &HeaderValue) -> HeaderMap {
        // Simulate the browser echoing the Set-Cookie pair back.
        let pair = cookie
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&pair).unwrap());
        headers
    }

    async fn sample_user(store: &MemoryStore) -> UserRecord {
        match store.insert_local("alice", "hash").await.unwrap() {
            crate::store::SignupOutcome::Created(user) => user,
            crate::store::SignupOutcome::Conflict => unreachable!(),
        }
    }

    #[tokio::test]
    async fn establish_then_resolve_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store.clone());
        let user = sample_user(&store).await;

        let cookie = manager.establish(&user).await.unwrap();
        let headers = request_headers(&cookie);

        match manager.resolve(&headers).await.unwrap() {
            AuthSession::Authenticated(resolved) => assert_eq!(resolved.id, user.id),
            AuthSession::Unauthenticated => panic!("expected an authenticated session"),
        }
    }

    #[tokio::test]
    async fn deleted_user_degrades_to_unauthenticated() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store.clone());
        let user = sample_user(&store).await;

        let cookie = manager.establish(&user).await.unwrap();
        let token = extract_session_token(&request_headers(&cookie)).unwrap();
        store.remove_user(user.id).await;

        let err = manager.user_for_token(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionUserNotFound));

        let session = manager.resolve(&request_headers(&cookie)).await.unwrap();
        assert!(matches!(session, AuthSession::Unauthenticated));
    }

    #[tokio::test]
    async fn clear_revokes_the_session() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store.clone());
        let user = sample_user(&store).await;

        let cookie = manager.establish(&user).await.unwrap();
        let headers = request_headers(&cookie);

        let clearing = manager.clear(&headers).await.unwrap();
        assert!(clearing.to_str().unwrap().contains("Max-Age=0"));

        let session = manager.resolve(&headers).await.unwrap();
        assert!(matches!(session, AuthSession::Unauthenticated));
    }

    #[tokio::test]
    async fn missing_or_garbage_cookie_is_unauthenticated() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store);

        let session = manager.resolve(&HeaderMap::new()).await.unwrap();
        assert!(matches!(session, AuthSession::Unauthenticated));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("confidant_session=bogus"));
        let session = manager.resolve(&headers).await.unwrap();
        assert!(matches!(session, AuthSession::Unauthenticated));
    }

    #[test]
    fn cookie_attributes() {
        let cookie = session_cookie("token", 60, true).unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("confidant_session=token"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=60"));
        assert!(value.ends_with("Secure"));

        let plain = session_cookie("token", 60, false).unwrap();
        assert!(!plain.to_str().unwrap().contains("Secure"));
    }

    #[test]
    fn token_extraction_handles_multiple_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; confidant_session=tok123; lang=en"),
        );
        assert_eq!(extract_session_token(&headers), Some("tok123".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn token_hashing_is_stable_and_token_generation_is_not() {
        assert_eq!(hash_session_token("tok"), hash_session_token("tok"));
        assert_ne!(hash_session_token("tok"), hash_session_token("other"));

        let first = generate_session_token().unwrap();
        let second = generate_session_token().unwrap();
        assert_ne!(first, second);
        assert_eq!(
            base64::engine::general_purpose::URL_SAFE_NO_PAD
                .decode(first.as_bytes())
                .unwrap()
                .len(),
            32
        );
    }
}
