//! Auth configuration and the orchestrating state.
//!
//! `AuthState` is the explicit dependency bundle the handlers run against:
//! credential verifier, federation resolver, session manager, and provider
//! clients are constructor parameters, not process-wide registrations.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::credentials::CredentialVerifier;
use super::federation::{FederationResolver, Provider};
use super::oauth::{PendingAuthorizations, ProviderClient};
use super::session::SessionManager;
use crate::store::{SessionStore, UserStore};

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    session_ttl_seconds: i64,
    session_cookie_secure: bool,
}

impl AuthConfig {
    /// `base_url` is the externally visible origin of this deployment; the
    /// cookie Secure flag follows its scheme.
    #[must_use]
    pub fn new(base_url: String) -> Self {
        let secure = Url::parse(&base_url)
            .map(|url| url.scheme() == "https")
            .unwrap_or(false);
        Self {
            base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_secure: secure,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub const fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    /// The absolute callback URL this deployment serves for `provider`.
    #[must_use]
    pub fn callback_url(&self, provider: Provider) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/auth/{provider}/callback")
    }
}

/// The configured federation clients plus the shared pieces their protocol
/// needs: one HTTP client and the pending-authorization stash.
pub struct ProviderRegistry {
    google: Option<ProviderClient>,
    facebook: Option<ProviderClient>,
    pending: PendingAuthorizations,
    http: reqwest::Client,
}

impl ProviderRegistry {
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(google: Option<ProviderClient>, facebook: Option<ProviderClient>) -> Result<Self> {
        // oauth2's token exchange requires redirects to stay disabled.
        let http = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("failed to build federation HTTP client")?;
        Ok(Self {
            google,
            facebook,
            pending: PendingAuthorizations::default(),
            http,
        })
    }

    #[must_use]
    pub const fn client(&self, provider: Provider) -> Option<&ProviderClient> {
        match provider {
            Provider::Google => self.google.as_ref(),
            Provider::Facebook => self.facebook.as_ref(),
        }
    }

    #[must_use]
    pub const fn pending(&self) -> &PendingAuthorizations {
        &self.pending
    }

    #[must_use]
    pub const fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

pub struct AuthState {
    config: AuthConfig,
    users: Arc<dyn UserStore>,
    verifier: CredentialVerifier,
    resolver: FederationResolver,
    sessions: SessionManager,
    providers: ProviderRegistry,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserStore>,
        session_store: Arc<dyn SessionStore>,
        providers: ProviderRegistry,
    ) -> Self {
        let sessions = SessionManager::new(
            session_store,
            users.clone(),
            config.session_ttl_seconds(),
            config.session_cookie_secure(),
        );
        Self {
            verifier: CredentialVerifier::new(users.clone()),
            resolver: FederationResolver::new(users.clone()),
            users,
            sessions,
            providers,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    #[must_use]
    pub const fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    #[must_use]
    pub const fn resolver(&self) -> &FederationResolver {
        &self.resolver
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[must_use]
    pub const fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }
}
