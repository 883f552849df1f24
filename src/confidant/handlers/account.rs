//! Local account protocols: registration, login, logout.
//!
//! Every outcome the end user sees is a redirect. A failed registration
//! bounces back to the form without detail, and a failed login never says
//! whether the username or the password was wrong.

use axum::{
    Form,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{
    internal_error, normalize_username, sign_in_and_redirect, valid_password, valid_username,
};
use crate::auth::{AuthError, AuthState, gate::LOGIN_PATH};

pub const REGISTER_PATH: &str = "/register";

#[derive(Deserialize, Debug)]
pub struct CredentialsForm {
    username: String,
    password: String,
}

pub async fn register(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Form<CredentialsForm>>,
) -> Response {
    let Some(Form(form)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let username = normalize_username(&form.username);
    if !valid_username(&username) || !valid_password(&form.password) {
        debug!("registration rejected: invalid username or password shape");
        return Redirect::to(REGISTER_PATH).into_response();
    }

    match auth_state.verifier().register(&username, &form.password).await {
        Ok(user) => sign_in_and_redirect(&auth_state, &user).await,
        Err(AuthError::DuplicateUsername) => {
            // Logged, not surfaced: the form simply comes back.
            warn!("registration failed: username already taken");
            Redirect::to(REGISTER_PATH).into_response()
        }
        Err(err) => {
            error!("Registration failed: {err}");
            internal_error()
        }
    }
}

pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Form<CredentialsForm>>,
) -> Response {
    let Some(Form(form)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let username = normalize_username(&form.username);
    match auth_state.verifier().authenticate(&username, &form.password).await {
        Ok(user) => sign_in_and_redirect(&auth_state, &user).await,
        // One path for "no such user" and "wrong password": the response
        // must not reveal which usernames exist.
        Err(AuthError::NotFound | AuthError::InvalidCredentials) => {
            info!("login failed");
            Redirect::to(LOGIN_PATH).into_response()
        }
        Err(err) => {
            error!("Login failed: {err}");
            internal_error()
        }
    }
}

pub async fn logout(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    match auth_state.sessions().clear(&headers).await {
        Ok(cookie) => {
            let mut response_headers = HeaderMap::new();
            response_headers.insert(SET_COOKIE, cookie);
            (response_headers, Redirect::to("/")).into_response()
        }
        Err(err) => {
            error!("Logout failed: {err}");
            internal_error()
        }
    }
}
