pub mod account;
pub mod federated;
pub mod health;
pub mod pages;
pub mod secrets;

// Common helpers for the handlers.

use axum::http::{HeaderMap, StatusCode, header::SET_COOKIE};
use axum::response::{IntoResponse, Redirect, Response};
use regex::Regex;
use tracing::error;

use crate::auth::{AuthSession, AuthState};
use crate::store::UserRecord;

pub const SECRETS_PATH: &str = "/secrets";

/// Usernames: 3..=64 chars, lowercase alphanumeric start, then `_`, `-`,
/// `.`, `@`, `+` allowed (emails pass).
pub fn valid_username(username: &str) -> bool {
    if !(3..=64).contains(&username.len()) {
        return false;
    }
    Regex::new(r"^[a-z0-9][a-z0-9_@.+-]*$").is_ok_and(|re| re.is_match(username))
}

pub fn valid_password(password: &str) -> bool {
    !password.is_empty() && password.len() <= 128
}

/// Normalize a submitted username for lookup and uniqueness.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Resolve the request's session; storage trouble is fatal to the request.
pub(crate) async fn current_session(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<AuthSession, Response> {
    state.sessions().resolve(headers).await.map_err(|err| {
        error!("Failed to resolve session: {err}");
        internal_error()
    })
}

/// Establish a session for `user` and redirect.
pub(crate) async fn sign_in_and_redirect(state: &AuthState, user: &UserRecord) -> Response {
    match state.sessions().establish(user).await {
        Ok(cookie) => {
            let mut headers = HeaderMap::new();
            headers.insert(SET_COOKIE, cookie);
            (headers, Redirect::to(SECRETS_PATH)).into_response()
        }
        Err(err) => {
            error!("Failed to establish session: {err}");
            internal_error()
        }
    }
}

pub(crate) fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Something went wrong".to_string(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_username_accepts_names_and_emails() {
        assert!(valid_username("alice"));
        assert!(valid_username("alice-2"));
        assert!(valid_username("alice@example.com"));
    }

    #[test]
    fn valid_username_rejects_bad_shapes() {
        assert!(!valid_username("al"));
        assert!(!valid_username("_leading"));
        assert!(!valid_username("Spaces here"));
        assert!(!valid_username(&"a".repeat(65)));
    }

    #[test]
    fn valid_password_bounds() {
        assert!(valid_password("pw1"));
        assert!(!valid_password(""));
        assert!(!valid_password(&"p".repeat(129)));
    }

    #[test]
    fn normalize_username_trims_and_lowercases() {
        assert_eq!(normalize_username(" Alice "), "alice");
    }
}
