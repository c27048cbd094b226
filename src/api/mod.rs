//! Server assembly: pool, auth state, router, and listener.

use anyhow::{Context, Result};
use axum::{
    Extension, Json, Router,
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware,
    routing::{delete, get, post},
};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, info_span};

pub(crate) mod email;
pub(crate) mod handlers;
mod openapi;

pub use email::{SignInSender, select_sender};
pub use handlers::auth::{AuthConfig, AuthState, AuthStore, PgAuthStore, TokenCodec};

use handlers::auth::{filters, signin};

/// Build the application router around an already-constructed auth state.
pub fn router(pool: PgPool, auth_state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/openapi.json", get(openapi_json))
        .route("/v1/auth/signup", post(signin::signup))
        .route("/v1/auth/signin", post(signin::signin))
        .route("/v1/auth/exchange", post(signin::exchange))
        .route("/v1/auth/signout", post(signin::signout))
        .route("/v1/auth/session", get(signin::session))
        .route("/v1/me", delete(signin::deactivate))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http().make_span_with(
                    |request: &Request<Body>| {
                        let path = request
                            .extensions()
                            .get::<MatchedPath>()
                            .map_or_else(|| request.uri().path(), MatchedPath::as_str);
                        info_span!(
                            "http.request",
                            method = %request.method(),
                            path,
                        )
                    },
                ))
                .layer(Extension(pool))
                .layer(Extension(Arc::clone(&auth_state)))
                .layer(middleware::from_fn_with_state(
                    Arc::clone(&auth_state),
                    filters::bearer_auth,
                ))
                .layer(middleware::from_fn_with_state(
                    auth_state,
                    filters::cookie_auth,
                )),
        )
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::openapi())
}

/// Connect to the database and serve the API until the process is stopped.
///
/// # Errors
/// Returns an error if the pool cannot be established or the listener fails.
pub async fn new(
    port: u16,
    dsn: String,
    auth_config: AuthConfig,
    codec: TokenCodec,
    sender: Arc<dyn SignInSender>,
) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store: Arc<dyn AuthStore> = Arc::new(PgAuthStore::new(pool.clone()));
    let auth_state = Arc::new(AuthState::new(auth_config, codec, store, sender));

    let app = router(pool, auth_state);

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    info!(port, "listening");
    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;
    Ok(())
}
