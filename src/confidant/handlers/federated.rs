//! Federated login: authorization redirect out, callback in.
//!
//! The callback trusts nothing it receives: the state parameter must match a
//! pending authorization for the same provider, and only a successful code
//! exchange yields a subject id. Every provider-side failure lands the user
//! back on the login form.

use axum::{
    extract::{Extension, Query},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::sign_in_and_redirect;
use crate::auth::federation::Provider;
use crate::auth::{AuthState, gate::LOGIN_PATH};

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

pub async fn google(auth_state: Extension<Arc<AuthState>>) -> Response {
    begin(&auth_state, Provider::Google).await
}

pub async fn google_callback(
    auth_state: Extension<Arc<AuthState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    callback(&auth_state, Provider::Google, query).await
}

pub async fn facebook(auth_state: Extension<Arc<AuthState>>) -> Response {
    begin(&auth_state, Provider::Facebook).await
}

pub async fn facebook_callback(
    auth_state: Extension<Arc<AuthState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    callback(&auth_state, Provider::Facebook, query).await
}

async fn begin(auth_state: &AuthState, provider: Provider) -> Response {
    let Some(client) = auth_state.providers().client(provider) else {
        warn!(%provider, "federation not configured");
        return Redirect::to(LOGIN_PATH).into_response();
    };
    let url = client
        .begin_authorization(auth_state.providers().pending())
        .await;
    Redirect::to(url.as_str()).into_response()
}

async fn callback(auth_state: &AuthState, provider: Provider, query: CallbackQuery) -> Response {
    let Some(client) = auth_state.providers().client(provider) else {
        warn!(%provider, "callback for unconfigured federation");
        return Redirect::to(LOGIN_PATH).into_response();
    };

    if let Some(denial) = query.error {
        info!(%provider, "authorization denied: {denial}");
        return Redirect::to(LOGIN_PATH).into_response();
    }

    let (Some(code), Some(state)) = (query.code, query.state) else {
        warn!(%provider, "callback missing code or state");
        return Redirect::to(LOGIN_PATH).into_response();
    };

    let Some(pkce_verifier) = auth_state.providers().pending().take(provider, &state).await else {
        warn!(%provider, "callback state unknown, expired, or reused");
        return Redirect::to(LOGIN_PATH).into_response();
    };

    let subject_id = match client
        .exchange_code(auth_state.providers().http(), code, pkce_verifier)
        .await
    {
        Ok(subject_id) => subject_id,
        Err(err) => {
            warn!(%provider, "federated login failed: {err}");
            return Redirect::to(LOGIN_PATH).into_response();
        }
    };

    match auth_state.resolver().resolve(provider, &subject_id).await {
        Ok(user) => sign_in_and_redirect(auth_state, &user).await,
        Err(err) => {
            error!(%provider, "failed to resolve federated identity: {err}");
            super::internal_error()
        }
    }
}
