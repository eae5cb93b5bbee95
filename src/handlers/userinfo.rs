//! GET /userinfo — the UserInfo endpoint (C8). Bearer extraction is inline
//! here, matching the teacher's own `handlers/oauth.rs::userinfo_handler`
//! pattern, rather than a dedicated auth middleware (see DESIGN.md).

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};

use crate::config::AppState;
use crate::dto::oauth::UserInfoResponse;
use crate::error::OAuthError;
use crate::repositories::{OAuthClientRepository, UserRepository};
use crate::services::grant_store::GrantStore;
use crate::services::oauth::OAuthService;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ")
}

pub async fn userinfo_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return OAuthError::MissingToken.into_response();
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

    let claims = match oauth_service.resolve_access_token(token).await {
        Ok(claims) => claims,
        Err(e) => return e.into_response(),
    };

    let user_id = match claims.user_id() {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    let user = match oauth_service.find_user(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return OAuthError::UserNotFound.into_response(),
        Err(e) => return e.into_response(),
    };

    let mut response = UserInfoResponse {
        sub: user.id.to_string(),
        email: None,
        email_verified: None,
        name: None,
        given_name: None,
        family_name: None,
        profile_picture: None,
    };

    if claims.has_scope("email") {
        response.email = Some(user.email.clone());
        response.email_verified = Some(user.email_verified);
    }

    if claims.has_scope("profile") {
        response.name = user.username.clone();
        response.given_name = user.first_name.clone();
        response.family_name = user.last_name.clone();
        response.profile_picture = user.profile_picture_url.clone();
    }

    Json(response).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_extracts_from_authorization_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer abc.def.ghi".parse().unwrap(),
        );
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn bearer_token_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Basic abc.def.ghi".parse().unwrap(),
        );
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn bearer_token_missing_header_is_none() {
        let headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
    }
}
