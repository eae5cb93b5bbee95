use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[allow(dead_code)]
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("User is inactive")]
    UserInactive,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            AuthError::UserNotFound => (StatusCode::NOT_FOUND, "user_not_found"),
            AuthError::UserInactive => (StatusCode::FORBIDDEN, "user_inactive"),
            AuthError::EmailAlreadyExists => (StatusCode::CONFLICT, "email_exists"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "token_expired"),
            AuthError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// Errors surfaced by the OAuth2/OIDC protocol engine (authorize, token,
/// userinfo, revoke). Variants map one-to-one onto the `error` field the
/// wire contract requires (RFC 6749 section 5.2, OIDC Core section 3.1.2.6).
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Client authentication failed")]
    InvalidClient,

    #[error("{0}")]
    InvalidGrant(String),

    #[error("Grant type is not supported")]
    UnsupportedGrantType,

    #[error("Response type is not supported")]
    UnsupportedResponseType,

    #[error("{0}")]
    InvalidScope(String),

    #[error("Redirect URI is not registered for this client")]
    InvalidRedirectUri,

    #[error("Access denied")]
    AccessDenied,

    #[error("Bearer token is missing")]
    MissingToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Token is invalid")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Authorization session was lost")]
    SessionLost,

    #[error("Authorization session has expired")]
    SessionExpired,

    #[error("Internal server error")]
    ServerError(String),
}

impl OAuthError {
    /// The stable `error` code this variant serializes to on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::InvalidClient => "invalid_client",
            OAuthError::InvalidGrant(_) => "invalid_grant",
            OAuthError::UnsupportedGrantType => "unsupported_grant_type",
            OAuthError::UnsupportedResponseType => "unsupported_response_type",
            OAuthError::InvalidScope(_) => "invalid_scope",
            OAuthError::InvalidRedirectUri => "invalid_redirect_uri",
            OAuthError::AccessDenied => "access_denied",
            OAuthError::MissingToken => "missing_token",
            OAuthError::TokenExpired => "token_expired",
            OAuthError::TokenRevoked => "token_revoked",
            OAuthError::InvalidToken => "invalid_token",
            OAuthError::UserNotFound => "user_not_found",
            OAuthError::SessionLost => "session_lost",
            OAuthError::SessionExpired => "session_expired",
            OAuthError::ServerError(_) => "server_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            OAuthError::MissingToken
            | OAuthError::TokenExpired
            | OAuthError::TokenRevoked
            | OAuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            OAuthError::UserNotFound => StatusCode::NOT_FOUND,
            OAuthError::AccessDenied => StatusCode::FORBIDDEN,
            OAuthError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn as_json_response(&self, status: StatusCode) -> Response {
        let error = self.code().to_string();

        if let OAuthError::ServerError(detail) = self {
            tracing::error!(error = %detail, "oauth dependency failure");
        } else {
            tracing::warn!(error = %error, "oauth protocol error");
        }

        let message = match self {
            OAuthError::ServerError(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            error,
            message,
            status_code: status.as_u16(),
        });

        (status, body).into_response()
    }

    /// `/logout` answers only 204 or 400 (SPEC §4.9): an expired, revoked,
    /// invalid, or missing bearer token is reported as 400, never the 401
    /// that the shared `status()` mapping uses for `/userinfo`. Grounded on
    /// the source's `LogoutView`, which returns `status=400` for all of
    /// these cases.
    pub fn into_logout_response(self) -> Response {
        let status = match self {
            OAuthError::MissingToken
            | OAuthError::TokenExpired
            | OAuthError::TokenRevoked
            | OAuthError::InvalidToken => StatusCode::BAD_REQUEST,
            other => other.status(),
        };
        self.as_json_response(status)
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        self.as_json_response(status)
    }
}

impl From<redis::RedisError> for OAuthError {
    fn from(e: redis::RedisError) -> Self {
        OAuthError::ServerError(format!("grant store error: {}", e))
    }
}

impl From<sqlx::Error> for OAuthError {
    fn from(e: sqlx::Error) -> Self {
        OAuthError::ServerError(format!("database error: {}", e))
    }
}

impl From<serde_json::Error> for OAuthError {
    fn from(e: serde_json::Error) -> Self {
        OAuthError::ServerError(format!("serialization error: {}", e))
    }
}
