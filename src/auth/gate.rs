//! The authentication gate: a request is either signed in or it is not.

use axum::response::Redirect;

use crate::store::UserRecord;

pub const LOGIN_PATH: &str = "/login";

/// Session state attached to a request after cookie resolution.
#[derive(Debug)]
pub enum AuthSession {
    Unauthenticated,
    Authenticated(UserRecord),
}

impl AuthSession {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Admit the request or bounce it to the login form.
    ///
    /// This is a user-facing boundary: denial is a redirect, never an error
    /// status.
    pub fn require_authenticated(self) -> Result<UserRecord, Redirect> {
        match self {
            Self::Authenticated(user) => Ok(user),
            Self::Unauthenticated => Err(Redirect::to(LOGIN_PATH)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user() -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            username: Some("alice".to_string()),
            password_hash: Some("hash".to_string()),
            google_subject_id: None,
            facebook_subject_id: None,
            secret: None,
        }
    }

    #[test]
    fn authenticated_passes_the_user_through() {
        let user = user();
        let id = user.id;
        let admitted = AuthSession::Authenticated(user).require_authenticated();
        assert_eq!(admitted.unwrap().id, id);
    }

    #[test]
    fn unauthenticated_is_redirected() {
        assert!(AuthSession::Unauthenticated.require_authenticated().is_err());
        assert!(!AuthSession::Unauthenticated.is_authenticated());
    }
}
