//! GET /authorize — the authorization endpoint (C6).
//!
//! Authentication of the end user is an out-of-scope collaborator (SPEC §1):
//! this handler trusts an upstream login system to have already resolved the
//! subject and to forward it via the `X-Authenticated-User-Id` header (the
//! same "authenticated subject is available after login" contract the
//! source's `AuthorizeView` leans on via `request.user`). When that header is
//! absent, the in-progress request is persisted into the OIDC session context
//! and the caller is sent to `/login` with a `next` pointing back at
//! `/authorize/resume`, mirroring `LoginView.get_success_url()`'s `next`-param
//! pattern (see DESIGN.md C6).

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use uuid::Uuid;

use crate::config::AppState;
use crate::dto::oauth::AuthorizationRequest;
use crate::error::OAuthError;
use crate::services::grant_store::OidcSessionContext;
use crate::services::oauth::AuthorizeParams;

fn authenticated_user_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get("x-authenticated-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn to_authorize_params(req: &AuthorizationRequest) -> AuthorizeParams {
    AuthorizeParams {
        client_id: req.client_id.clone(),
        redirect_uri: req.redirect_uri.clone(),
        response_type: req.response_type.clone(),
        scopes: req.scopes(),
        state: req.state.clone(),
        nonce: req.nonce.clone(),
        code_challenge: req.code_challenge.clone(),
        code_challenge_method: req.code_challenge_method.clone(),
    }
}

/// Build a redirect to `redirect_uri` carrying `error` (and `state`, if
/// present). Only called once the redirect_uri is already known to be
/// registered for the client (SPEC §4.6: "must NOT use redirect_uri unless
/// it is known-safe").
fn error_redirect(redirect_uri: &str, error: &str, state: Option<&str>) -> Response {
    let mut location = format!("{redirect_uri}?error={}", urlencoding::encode(error));
    if let Some(state) = state {
        location.push_str("&state=");
        location.push_str(&urlencoding::encode(state));
    }
    Redirect::to(&location).into_response()
}

/// A failure before the redirect_uri is known-safe: never redirects there.
/// Sends the caller to a generic error page instead of a bare JSON body, the
/// same convention the source's `AuthorizeView` uses for every pre-binding
/// failure (`redirect("/error?error=<code>")`).
fn unsafe_error_response(err: OAuthError) -> Response {
    Redirect::to(&format!("/error?error={}", urlencoding::encode(err.code()))).into_response()
}

async fn complete_authorize(
    state: &AppState,
    params: &AuthorizeParams,
    user_id: Uuid,
) -> Response {
    let oauth_service = crate::services::oauth::OAuthService::new(
        crate::repositories::OAuthClientRepository::new(state.pool.clone()),
        crate::repositories::UserRepository::new(state.pool.clone()),
        crate::services::grant_store::GrantStore::new(state.redis.clone()),
        state.jwt_manager.clone(),
        state.config.issuer_url.clone(),
        state.config.auth_code_ttl_secs,
        state.config.refresh_token_expiration_secs,
    );

    let (client, granted_scopes) = match oauth_service.validate_authorize_request(params).await {
        Ok(ok) => ok,
        Err(e @ OAuthError::InvalidScope(_)) => {
            // redirect_uri binding (step 5) already passed for this error.
            return error_redirect(&params.redirect_uri, e.code(), params.state.as_deref());
        }
        Err(e) => return unsafe_error_response(e),
    };

    let code = match oauth_service
        .issue_authorization_code(
            user_id,
            &client.client_id,
            &params.redirect_uri,
            &granted_scopes,
            params.nonce.clone(),
            params.code_challenge.clone(),
            params.code_challenge_method.clone(),
        )
        .await
    {
        Ok(code) => code,
        Err(e) => return error_redirect(&params.redirect_uri, e.code(), params.state.as_deref()),
    };

    let mut location = format!(
        "{}?code={}",
        params.redirect_uri,
        urlencoding::encode(&code)
    );
    if let Some(state) = &params.state {
        location.push_str("&state=");
        location.push_str(&urlencoding::encode(state));
    }
    Redirect::to(&location).into_response()
}

pub async fn authorize_handler(
    State(state): State<AppState>,
    Query(req): Query<AuthorizationRequest>,
    headers: HeaderMap,
) -> Response {
    if req.response_type != "code" {
        return unsafe_error_response(OAuthError::UnsupportedResponseType);
    }

    let params = to_authorize_params(&req);

    if let Some(user_id) = authenticated_user_id(&headers) {
        return complete_authorize(&state, &params, user_id).await;
    }

    // Login detour: persist the request, send the caller to the (external)
    // login page with a `next` pointing at the resume endpoint.
    let session_key = uuid::Uuid::new_v4().to_string();
    let grant_store = crate::services::grant_store::GrantStore::new(state.redis.clone());
    let ctx = OidcSessionContext {
        client_id: params.client_id.clone(),
        redirect_uri: params.redirect_uri.clone(),
        state: params.state.clone(),
        scope: req.scope.clone(),
        nonce: params.nonce.clone(),
        code_challenge: params.code_challenge.clone(),
        code_challenge_method: params.code_challenge_method.clone(),
        timestamp: Utc::now(),
    };

    if let Err(e) = grant_store
        .put_session_context(&session_key, &ctx, state.config.auth_code_ttl_secs)
        .await
    {
        return unsafe_error_response(e);
    }

    let next = urlencoding::encode(&format!("/authorize/resume?session={session_key}")).into_owned();
    Redirect::to(&format!("/login?next={next}")).into_response()
}

/// Resume an authorize request after the login detour completes. Expects
/// the same `X-Authenticated-User-Id` contract to now be satisfied.
pub async fn authorize_resume_handler(
    State(state): State<AppState>,
    Query(q): Query<ResumeQuery>,
    headers: HeaderMap,
) -> Response {
    let grant_store = crate::services::grant_store::GrantStore::new(state.redis.clone());

    let ctx = match grant_store.get_session_context(&q.session).await {
        Ok(Some(ctx)) => ctx,
        Ok(None) => return unsafe_error_response(OAuthError::SessionLost),
        Err(e) => return unsafe_error_response(e),
    };

    let age = Utc::now().signed_duration_since(ctx.timestamp).num_seconds();
    if age > state.config.auth_code_ttl_secs {
        let _ = grant_store.delete_session_context(&q.session).await;
        return unsafe_error_response(OAuthError::SessionExpired);
    }

    let Some(user_id) = authenticated_user_id(&headers) else {
        return unsafe_error_response(OAuthError::AccessDenied);
    };

    let _ = grant_store.delete_session_context(&q.session).await;

    let params = AuthorizeParams {
        client_id: ctx.client_id,
        redirect_uri: ctx.redirect_uri,
        response_type: "code".to_string(),
        scopes: ctx
            .scope
            .as_ref()
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default(),
        state: ctx.state,
        nonce: ctx.nonce,
        code_challenge: ctx.code_challenge,
        code_challenge_method: ctx.code_challenge_method,
    };

    complete_authorize(&state, &params, user_id).await
}

#[derive(Debug, serde::Deserialize)]
pub struct ResumeQuery {
    pub session: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticated_user_id_parses_header() {
        let mut headers = HeaderMap::new();
        let id = Uuid::new_v4();
        headers.insert(
            "x-authenticated-user-id",
            id.to_string().parse().unwrap(),
        );
        assert_eq!(authenticated_user_id(&headers), Some(id));
    }

    #[test]
    fn authenticated_user_id_absent_is_none() {
        let headers = HeaderMap::new();
        assert_eq!(authenticated_user_id(&headers), None);
    }

    #[test]
    fn authenticated_user_id_malformed_is_none() {
        let mut headers = HeaderMap::new();
        headers.insert("x-authenticated-user-id", "not-a-uuid".parse().unwrap());
        assert_eq!(authenticated_user_id(&headers), None);
    }
}
