//! POST /logout — revocation (C9). Verifies the bearer token, blacklists it
//! until its natural expiry if still valid, and responds 204. An already
//! expired or otherwise invalid token is reported as 400 with the matching
//! error code rather than raised (SPEC §4.9).

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::config::AppState;
use crate::error::OAuthError;
use crate::repositories::{OAuthClientRepository, UserRepository};
use crate::services::grant_store::GrantStore;
use crate::services::oauth::OAuthService;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ")
}

pub async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return OAuthError::MissingToken.into_logout_response();
    };

    let oauth_service = OAuthService::new(
        OAuthClientRepository::new(state.pool.clone()),
        UserRepository::new(state.pool.clone()),
        GrantStore::new(state.redis.clone()),
        state.jwt_manager.clone(),
        state.config.issuer_url.clone(),
        state.config.auth_code_ttl_secs,
        state.config.refresh_token_expiration_secs,
    );

    match oauth_service.revoke_access_token(token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_logout_response(),
    }
}
