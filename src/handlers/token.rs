//! POST /token and POST /token/refresh — the token endpoints (C7).
//! `token_handler` dispatches by `grant_type` onto
//! `OAuthService::exchange_authorization_code` / `exchange_refresh_token`.
//! `token_refresh_handler` is the dedicated `/token/refresh` handler: the
//! original `RefreshTokenView` takes only `refresh_token`, no `grant_type`,
//! so it is accepted regardless of whatever `grant_type` (if any) is sent.
//! Grounded on the teacher's `handlers/oauth.rs::token_handler` dispatch
//! shape; `client_credentials` is dropped (SPEC §1 Non-goal).

use axum::{
    extract::{Form, State},
    response::{IntoResponse, Response},
    Json,
};

use crate::config::AppState;
use crate::dto::oauth::{OAuthTokenResponseDto, TokenRequest};
use crate::error::OAuthError;
use crate::repositories::{OAuthClientRepository, UserRepository};
use crate::services::grant_store::GrantStore;
use crate::services::oauth::OAuthService;

fn build_service(state: &AppState) -> OAuthService {
    OAuthService::new(
        OAuthClientRepository::new(state.pool.clone()),
        UserRepository::new(state.pool.clone()),
        GrantStore::new(state.redis.clone()),
        state.jwt_manager.clone(),
        state.config.issuer_url.clone(),
        state.config.auth_code_ttl_secs,
        state.config.refresh_token_expiration_secs,
    )
}

pub async fn token_handler(State(state): State<AppState>, Form(req): Form<TokenRequest>) -> Response {
    let oauth_service = build_service(&state);

    let result = match req.grant_type.as_deref() {
        Some("authorization_code") => {
            let (Some(client_id), Some(client_secret), Some(code), Some(redirect_uri)) = (
                req.client_id.as_deref(),
                req.client_secret.as_deref(),
                req.code.as_deref(),
                req.redirect_uri.as_deref(),
            ) else {
                return OAuthError::InvalidRequest(
                    "client_id, client_secret, code and redirect_uri are required".to_string(),
                )
                .into_response();
            };

            oauth_service
                .exchange_authorization_code(
                    client_id,
                    client_secret,
                    code,
                    redirect_uri,
                    req.code_verifier.as_deref(),
                )
                .await
        }
        Some("refresh_token") => {
            let Some(refresh_token) = req.refresh_token.as_deref() else {
                return OAuthError::InvalidRequest("refresh_token is required".to_string())
                    .into_response();
            };
            oauth_service.exchange_refresh_token(refresh_token).await
        }
        _ => return OAuthError::UnsupportedGrantType.into_response(),
    };

    match result {
        Ok(tokens) => Json(OAuthTokenResponseDto::from(tokens)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /token/refresh — accepts a bare `refresh_token` with no `grant_type`
/// requirement, matching the original `RefreshTokenView` contract.
pub async fn token_refresh_handler(
    State(state): State<AppState>,
    Form(req): Form<TokenRequest>,
) -> Response {
    let oauth_service = build_service(&state);

    let Some(refresh_token) = req.refresh_token.as_deref() else {
        return OAuthError::InvalidRequest("refresh_token is required".to_string()).into_response();
    };

    match oauth_service.exchange_refresh_token(refresh_token).await {
        Ok(tokens) => Json(OAuthTokenResponseDto::from(tokens)).into_response(),
        Err(e) => e.into_response(),
    }
}
