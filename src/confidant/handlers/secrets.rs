//! The protected resource: submitting a secret, plus the public listing.
//!
//! `/secrets` is browsable without a session; submission is gated.

use axum::{
    Form,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use super::{SECRETS_PATH, current_session, internal_error};
use crate::auth::AuthState;

const SECRET_MAX_LENGTH: usize = 512;

#[derive(Deserialize, Debug)]
pub struct SecretForm {
    secret: String,
}

pub async fn secrets(auth_state: Extension<Arc<AuthState>>) -> Response {
    let stored = match auth_state.users().list_secrets().await {
        Ok(stored) => stored,
        Err(err) => {
            error!("Failed to list secrets: {err}");
            return internal_error();
        }
    };

    let mut body = String::from("<h1>You shall never know who wrote these</h1>\n<ul>\n");
    for secret in &stored {
        body.push_str(&format!("<li>{}</li>\n", escape_html(secret)));
    }
    body.push_str("</ul>\n<p><a href=\"/submit\">Share a secret</a> | <a href=\"/logout\">Log out</a></p>");

    Html(format!(
        "<!DOCTYPE html>\n<html><head><title>Secrets - confidant</title></head>\n<body>\n{body}\n</body></html>"
    ))
    .into_response()
}

pub async fn submit_form(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    let session = match current_session(&headers, &auth_state).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    if let Err(redirect) = session.require_authenticated() {
        return redirect.into_response();
    }

    Html(
        "<!DOCTYPE html>\n<html><head><title>Submit - confidant</title></head>\n<body>\n\
         <h1>Share a secret</h1>\n\
         <form method=\"post\" action=\"/submit\">\n\
         <label>Your secret <input name=\"secret\"></label>\n\
         <button type=\"submit\">Submit</button>\n\
         </form>\n\
         </body></html>"
            .to_string(),
    )
    .into_response()
}

pub async fn submit(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Form<SecretForm>>,
) -> Response {
    let session = match current_session(&headers, &auth_state).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    let user = match session.require_authenticated() {
        Ok(user) => user,
        Err(redirect) => return redirect.into_response(),
    };

    let Some(Form(form)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let secret = form.secret.trim();
    if secret.is_empty() || secret.len() > SECRET_MAX_LENGTH {
        return Redirect::to("/submit").into_response();
    }

    match auth_state.users().save_secret(user.id, secret).await {
        Ok(()) => Redirect::to(SECRETS_PATH).into_response(),
        Err(err) => {
            error!("Failed to save secret: {err}");
            internal_error()
        }
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"
        );
        assert_eq!(escape_html("a & b"), "a &amp; b");
    }
}
