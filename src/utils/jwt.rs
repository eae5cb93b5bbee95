use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::OAuthError;

/// OAuth2 access token claims.
///
/// # Requirements
/// - sub (user_id), client_id (audience), granted scopes, exp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// Subject - the authenticated user's id
    pub sub: String,
    /// The client this token was issued to
    pub client_id: String,
    /// Granted scopes, space-separated
    pub scope: String,
    pub exp: i64,
    pub iat: i64,
}

impl AccessTokenClaims {
    pub fn new(user_id: Uuid, client_id: &str, scopes: &[String], expiry_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            client_id: client_id.to_string(),
            scope: scopes.join(" "),
            exp: (now + Duration::seconds(expiry_secs)).timestamp(),
            iat: now.timestamp(),
        }
    }

    pub fn user_id(&self) -> Result<Uuid, OAuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| OAuthError::InvalidToken)
    }

    pub fn scopes(&self) -> Vec<String> {
        self.scope.split_whitespace().map(String::from).collect()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}

/// OpenID Connect ID token claims (OIDC Core 1.0 section 2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl IdTokenClaims {
    pub fn new(
        issuer: &str,
        user_id: Uuid,
        client_id: &str,
        nonce: Option<String>,
        expiry_secs: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            iss: issuer.to_string(),
            sub: user_id.to_string(),
            aud: client_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(expiry_secs)).timestamp(),
            nonce,
        }
    }
}

/// Distinguishes why a token failed to verify, so callers can map to the
/// correct wire error code (`token_expired` vs `invalid_token`).
#[derive(Debug)]
pub enum VerifyError {
    Expired,
    Malformed,
}

impl From<VerifyError> for OAuthError {
    fn from(e: VerifyError) -> Self {
        match e {
            VerifyError::Expired => OAuthError::TokenExpired,
            VerifyError::Malformed => OAuthError::InvalidToken,
        }
    }
}

/// Signs and verifies HS256 tokens over a single process-wide secret key.
///
/// Clock semantics: `exp` is compared against the wall clock with an
/// optional, disabled-by-default skew tolerance (capped at 60s).
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    access_token_expiry_secs: i64,
    id_token_expiry_secs: i64,
    clock_skew_tolerance_secs: u64,
}

impl JwtManager {
    pub fn new(
        secret: &str,
        access_token_expiry_secs: i64,
        id_token_expiry_secs: i64,
        clock_skew_tolerance_secs: i64,
    ) -> Self {
        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            access_token_expiry_secs,
            id_token_expiry_secs,
            clock_skew_tolerance_secs: clock_skew_tolerance_secs.clamp(0, 60) as u64,
        }
    }

    pub fn access_token_expiry_secs(&self) -> i64 {
        self.access_token_expiry_secs
    }

    pub fn sign_access_token(
        &self,
        user_id: Uuid,
        client_id: &str,
        scopes: &[String],
    ) -> Result<String, OAuthError> {
        let claims = AccessTokenClaims::new(user_id, client_id, scopes, self.access_token_expiry_secs);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| OAuthError::ServerError(format!("token signing failed: {}", e)))
    }

    pub fn sign_id_token(
        &self,
        issuer: &str,
        user_id: Uuid,
        client_id: &str,
        nonce: Option<String>,
    ) -> Result<String, OAuthError> {
        let claims = IdTokenClaims::new(issuer, user_id, client_id, nonce, self.id_token_expiry_secs);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| OAuthError::ServerError(format!("token signing failed: {}", e)))
    }

    /// Verify an access token, returning distinct error kinds for
    /// signature-invalid/malformed vs expired so callers can report the
    /// right wire error code.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, VerifyError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = self.clock_skew_tolerance_secs;

        decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => VerifyError::Expired,
                _ => VerifyError::Malformed,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-key-for-unit-tests-only";

    #[test]
    fn sign_and_verify_access_token_round_trips() {
        let manager = JwtManager::new(TEST_SECRET, 900, 900, 0);
        let user_id = Uuid::new_v4();
        let scopes = vec!["openid".to_string(), "email".to_string()];

        let token = manager
            .sign_access_token(user_id, "client-abc", &scopes)
            .unwrap();
        let claims = manager.verify_access_token(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.client_id, "client-abc");
        assert!(claims.has_scope("openid"));
        assert!(claims.has_scope("email"));
        assert!(!claims.has_scope("profile"));
    }

    #[test]
    fn verify_rejects_token_signed_with_different_secret() {
        let manager_a = JwtManager::new(TEST_SECRET, 900, 900, 0);
        let manager_b = JwtManager::new("a-completely-different-secret", 900, 900, 0);

        let token = manager_a
            .sign_access_token(Uuid::new_v4(), "client-abc", &[])
            .unwrap();

        let result = manager_b.verify_access_token(&token);
        assert!(matches!(result, Err(VerifyError::Malformed)));
    }

    #[test]
    fn verify_rejects_expired_token() {
        let manager = JwtManager::new(TEST_SECRET, -1, 900, 0);
        let token = manager
            .sign_access_token(Uuid::new_v4(), "client-abc", &[])
            .unwrap();

        let result = manager.verify_access_token(&token);
        assert!(matches!(result, Err(VerifyError::Expired)));
    }

    #[test]
    fn id_token_carries_nonce_when_present() {
        let manager = JwtManager::new(TEST_SECRET, 900, 900, 0);
        let user_id = Uuid::new_v4();
        let token = manager
            .sign_id_token("https://idp.test", user_id, "client-abc", Some("n1".to_string()))
            .unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&["client-abc"]);
        let decoding_key = DecodingKey::from_secret(TEST_SECRET.as_bytes());
        let claims = decode::<IdTokenClaims>(&token, &decoding_key, &validation)
            .unwrap()
            .claims;

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.nonce.as_deref(), Some("n1"));
        assert_eq!(claims.iss, "https://idp.test");
    }
}
