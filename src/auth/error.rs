use thiserror::Error;

/// Failure modes of the authentication core.
///
/// Credential and federation variants are converted to redirects at the
/// handler boundary; `Storage` and `Internal` are fatal to the request.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username already registered")]
    DuplicateUsername,
    #[error("unknown username")]
    NotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("session refers to a user that no longer exists")]
    SessionUserNotFound,
    #[error("federation failure: {0}")]
    Federation(String),
    #[error("storage unavailable: {0}")]
    Storage(#[source] anyhow::Error),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_failure() {
        assert_eq!(
            AuthError::DuplicateUsername.to_string(),
            "username already registered"
        );
        assert_eq!(
            AuthError::Federation("denied".to_string()).to_string(),
            "federation failure: denied"
        );
    }

    #[test]
    fn sqlx_errors_map_to_storage() {
        let err = AuthError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, AuthError::Storage(_)));
    }
}
