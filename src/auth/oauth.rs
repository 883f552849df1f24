//! OAuth2 authorization-code integration for the federated providers.
//!
//! Each provider runs the same protocol: build an authorization URL with a
//! CSRF state and a PKCE challenge, hold the verifier server-side until the
//! callback, exchange the code, then fetch the provider's stable subject id.
//! Only the subject id leaves this module; profile data is not persisted.

use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;
use url::Url;

use super::error::AuthError;
use super::federation::Provider;

/// Authorizations older than this are swept; the user restarts the flow.
const PENDING_TTL: Duration = Duration::from_secs(10 * 60);

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
// The v3 userinfo endpoint; the Google+ profile API it replaced is gone.
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

const FACEBOOK_AUTH_URL: &str = "https://www.facebook.com/dialog/oauth";
const FACEBOOK_TOKEN_URL: &str = "https://graph.facebook.com/oauth/access_token";
const FACEBOOK_USERINFO_URL: &str = "https://graph.facebook.com/me?fields=id";

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

#[derive(Debug, Deserialize)]
struct GoogleProfile {
    sub: String,
}

#[derive(Debug, Deserialize)]
struct FacebookProfile {
    id: String,
}

/// A started authorization waiting for its callback.
struct PendingAuthorization {
    provider: Provider,
    pkce_verifier: String,
    created_at: Instant,
}

/// Server-side stash of CSRF state → PKCE verifier, swept on insert.
#[derive(Default)]
pub struct PendingAuthorizations {
    entries: Mutex<HashMap<String, PendingAuthorization>>,
}

impl PendingAuthorizations {
    async fn store(&self, state: String, provider: Provider, pkce_verifier: String) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.created_at.elapsed() < PENDING_TTL);
        entries.insert(
            state,
            PendingAuthorization {
                provider,
                pkce_verifier,
                created_at: Instant::now(),
            },
        );
    }

    /// Consume the entry for `state` if it is fresh and belongs to
    /// `provider`. A state is single-use either way.
    pub async fn take(&self, provider: Provider, state: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        let entry = entries.remove(state)?;
        if entry.provider != provider || entry.created_at.elapsed() >= PENDING_TTL {
            return None;
        }
        Some(entry.pkce_verifier)
    }
}

/// One provider's OAuth2 client configuration.
pub struct ProviderClient {
    provider: Provider,
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
}

impl ProviderClient {
    /// Build a client for `provider`. `redirect_url` is the absolute
    /// callback URL this deployment serves for the provider.
    pub fn new(
        provider: Provider,
        client_id: String,
        client_secret: &SecretString,
        redirect_url: String,
    ) -> Result<Self, AuthError> {
        let (auth_url, token_url) = match provider {
            Provider::Google => (GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL),
            Provider::Facebook => (FACEBOOK_AUTH_URL, FACEBOOK_TOKEN_URL),
        };
        Ok(Self {
            provider,
            client_id: ClientId::new(client_id),
            client_secret: ClientSecret::new(client_secret.expose_secret().to_string()),
            auth_url: AuthUrl::new(auth_url.to_string())
                .map_err(|err| AuthError::Federation(format!("invalid auth url: {err}")))?,
            token_url: TokenUrl::new(token_url.to_string())
                .map_err(|err| AuthError::Federation(format!("invalid token url: {err}")))?,
            redirect_url: RedirectUrl::new(redirect_url)
                .map_err(|err| AuthError::Federation(format!("invalid redirect url: {err}")))?,
        })
    }

    #[must_use]
    pub const fn provider(&self) -> Provider {
        self.provider
    }

    fn oauth_client(&self) -> ConfiguredClient {
        BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
    }

    /// Build the authorization redirect with the minimal profile scope,
    /// stashing the CSRF state and PKCE verifier in `pending`.
    pub async fn begin_authorization(&self, pending: &PendingAuthorizations) -> Url {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let scope = match self.provider {
            Provider::Google => "profile",
            Provider::Facebook => "public_profile",
        };
        let (auth_url, csrf_state) = self
            .oauth_client()
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(scope.to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        pending
            .store(
                csrf_state.secret().clone(),
                self.provider,
                pkce_verifier.secret().clone(),
            )
            .await;

        auth_url
    }

    /// Exchange the callback's authorization code and return the provider's
    /// verified subject id.
    pub async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: String,
        pkce_verifier: String,
    ) -> Result<String, AuthError> {
        let token = self
            .oauth_client()
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(http)
            .await
            .map_err(|err| {
                warn!(provider = %self.provider, "token exchange failed: {err}");
                AuthError::Federation(format!("token exchange failed: {err}"))
            })?;

        self.fetch_subject_id(http, token.access_token().secret())
            .await
    }

    async fn fetch_subject_id(
        &self,
        http: &reqwest::Client,
        access_token: &str,
    ) -> Result<String, AuthError> {
        let userinfo_url = match self.provider {
            Provider::Google => GOOGLE_USERINFO_URL,
            Provider::Facebook => FACEBOOK_USERINFO_URL,
        };
        let response = http
            .get(userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| AuthError::Federation(format!("profile fetch failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AuthError::Federation(format!(
                "profile fetch returned {}",
                response.status()
            )));
        }

        match self.provider {
            Provider::Google => {
                let profile: GoogleProfile = response
                    .json()
                    .await
                    .map_err(|err| AuthError::Federation(format!("invalid profile: {err}")))?;
                Ok(profile.sub)
            }
            Provider::Facebook => {
                let profile: FacebookProfile = response
                    .json()
                    .await
                    .map_err(|err| AuthError::Federation(format!("invalid profile: {err}")))?;
                Ok(profile.id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(provider: Provider) -> ProviderClient {
        ProviderClient::new(
            provider,
            "client-id".to_string(),
            &SecretString::from("client-secret".to_string()),
            "http://localhost:8080/auth/google/callback".to_string(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn authorization_url_carries_state_and_pkce() {
        let pending = PendingAuthorizations::default();
        let url = client(Provider::Google).begin_authorization(&pending).await;

        assert!(url.as_str().starts_with(GOOGLE_AUTH_URL));
        let params: std::collections::HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(params.get("client_id").map(AsRef::as_ref), Some("client-id"));
        assert_eq!(params.get("scope").map(AsRef::as_ref), Some("profile"));
        assert_eq!(
            params.get("code_challenge_method").map(AsRef::as_ref),
            Some("S256")
        );

        // The state parameter must round-trip through the pending stash.
        let state = params.get("state").unwrap().to_string();
        assert!(pending.take(Provider::Google, &state).await.is_some());
    }

    #[tokio::test]
    async fn pending_state_is_single_use() {
        let pending = PendingAuthorizations::default();
        let url = client(Provider::Google).begin_authorization(&pending).await;
        let state = url
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.to_string())
            .unwrap();

        assert!(pending.take(Provider::Google, &state).await.is_some());
        assert!(pending.take(Provider::Google, &state).await.is_none());
    }

    #[tokio::test]
    async fn pending_state_is_provider_bound() {
        let pending = PendingAuthorizations::default();
        let url = client(Provider::Google).begin_authorization(&pending).await;
        let state = url
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.to_string())
            .unwrap();

        // A Facebook callback must not consume a Google authorization.
        assert!(pending.take(Provider::Facebook, &state).await.is_none());
    }

    #[test]
    fn facebook_endpoints_differ_from_google() {
        let facebook = client(Provider::Facebook);
        assert_eq!(facebook.provider(), Provider::Facebook);
        assert_ne!(GOOGLE_AUTH_URL, FACEBOOK_AUTH_URL);
        assert_ne!(GOOGLE_USERINFO_URL, FACEBOOK_USERINFO_URL);
    }
}
