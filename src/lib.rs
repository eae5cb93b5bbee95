pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppState;
use crate::handlers::{
    authorize_handler, authorize_resume_handler, health_handler, jwks_handler, logout_handler,
    openid_configuration_handler, ready_handler, token_handler, token_refresh_handler,
    userinfo_handler,
};

/// Build the OIDC-core router: authorize/token/token-refresh/userinfo/logout,
/// discovery and JWKS, plus the ambient health/ready pair. Pruned from the
/// teacher's much larger route table (see DESIGN.md "Trimmed entirely").
pub fn create_router(state: AppState) -> Router {
    let oauth_routes = Router::new()
        .route("/authorize", get(authorize_handler))
        .route("/authorize/resume", get(authorize_resume_handler))
        .route("/token", axum::routing::post(token_handler))
        .route("/token/refresh", axum::routing::post(token_refresh_handler))
        .route("/logout", axum::routing::post(logout_handler))
        .route("/userinfo", get(userinfo_handler))
        .route("/jwks", get(jwks_handler));

    let wellknown_routes = Router::new()
        .route("/openid-configuration", get(openid_configuration_handler));

    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .merge(oauth_routes)
        .nest("/.well-known", wellknown_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .max_age(Duration::from_secs(3600)),
        )
        .with_state(state)
}
