use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::get,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;

use crate::auth::{AuthConfig, AuthState, ProviderRegistry};
use crate::store::postgres::PgStore;

pub mod handlers;

/// Build the application router over an already-wired [`AuthState`].
///
/// Split out from [`new`] so tests can drive the full HTTP surface against
/// the in-memory store.
pub fn router(auth_state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/", get(handlers::pages::home))
        .route(
            "/register",
            get(handlers::pages::register_form).post(handlers::account::register),
        )
        .route(
            "/login",
            get(handlers::pages::login_form).post(handlers::account::login),
        )
        .route("/logout", get(handlers::account::logout))
        .route("/auth/google", get(handlers::federated::google))
        .route(
            "/auth/google/callback",
            get(handlers::federated::google_callback),
        )
        .route("/auth/facebook", get(handlers::federated::facebook))
        .route(
            "/auth/facebook/callback",
            get(handlers::federated::facebook_callback),
        )
        .route("/secrets", get(handlers::secrets::secrets))
        .route(
            "/submit",
            get(handlers::secrets::submit_form).post(handlers::secrets::submit),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(auth_state)),
        )
        // Health stays outside the trace stack; probes are noisy.
        .route(
            "/health",
            get(handlers::health::health).options(handlers::health::health),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    config: AuthConfig,
    providers: ProviderRegistry,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(PgStore::new(pool));
    let auth_state = Arc::new(AuthState::new(config, store.clone(), store, providers));

    let app = router(auth_state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
