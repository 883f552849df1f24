//! Authentication core: credential verification, federated identity
//! resolution, session establishment, and the authorization gate.
//!
//! ## Strategies
//!
//! Identity is established one of three ways: local username/password,
//! Google federation, or Facebook federation. The set is closed — local
//! login goes through [`credentials::CredentialVerifier`], federated login
//! through [`federation::FederationResolver`] — and the HTTP layer composes
//! them explicitly via [`state::AuthState`]; there is no runtime strategy
//! registry.
//!
//! ## Sessions
//!
//! A session persists exactly one value: the user record's id. The browser
//! holds a random token, storage holds its SHA-256 and the id. Every request
//! resolves its cookie once on the way in; every successful login or
//! registration writes one session on the way out.

pub mod credentials;
pub mod error;
pub mod federation;
pub mod gate;
pub mod oauth;
pub mod password;
pub mod session;
pub mod state;

pub use error::AuthError;
pub use gate::AuthSession;
pub use state::{AuthConfig, AuthState, ProviderRegistry};
