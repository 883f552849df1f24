//! # Confidant
//!
//! `confidant` is a small secret-sharing service: users sign in with a local
//! username/password account or through Google or Facebook federation, and
//! authenticated users may submit one secret that is listed anonymously.
//!
//! ## Identity model
//!
//! Each credential source keys its own records. A local registration owns a
//! unique username; a federated login owns the provider's subject id. There
//! is deliberately no merge path between them: the same human arriving via
//! two providers holds two records.
//!
//! ## Sessions
//!
//! Browsers hold a random session token in an `HttpOnly` cookie; the
//! database stores only the token's SHA-256 and the user id it refers to. A
//! session that outlives its user degrades to signed-out instead of failing
//! the request.

pub mod auth;
pub mod cli;
pub mod confidant;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
