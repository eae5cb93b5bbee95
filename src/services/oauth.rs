//! Orchestrates the Authorization Code + PKCE and refresh-token grants
//! against the Client Registry, the Grant Store, the PKCE Validator, and
//! the Token Signer.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::OAuthError;
use crate::models::{OAuthClient, User};
use crate::repositories::{oauth_client::verify_client_secret, OAuthClientRepository, UserRepository};
use crate::services::grant_store::{AuthCodeGrant, GrantStore, RefreshTokenRecord};
use crate::utils::jwt::JwtManager;
use crate::utils::{pkce, secret, uri};

/// Response shape shared by the authorization_code and refresh_token paths.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: String,
}

/// Parameters carried by an authorize request, whether presented fresh or
/// resumed from the OIDC session context after a login detour.
#[derive(Debug, Clone)]
pub struct AuthorizeParams {
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: String,
    pub scopes: Vec<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

#[derive(Clone)]
pub struct OAuthService {
    client_repo: OAuthClientRepository,
    user_repo: UserRepository,
    grant_store: GrantStore,
    jwt_manager: JwtManager,
    issuer_url: String,
    auth_code_ttl_secs: i64,
    refresh_token_expiration_secs: i64,
}

impl OAuthService {
    pub fn new(
        client_repo: OAuthClientRepository,
        user_repo: UserRepository,
        grant_store: GrantStore,
        jwt_manager: JwtManager,
        issuer_url: String,
        auth_code_ttl_secs: i64,
        refresh_token_expiration_secs: i64,
    ) -> Self {
        Self {
            client_repo,
            user_repo,
            grant_store,
            jwt_manager,
            issuer_url,
            auth_code_ttl_secs,
            refresh_token_expiration_secs,
        }
    }

    /// Validation order for the authorize endpoint: response_type, then
    /// presence, then openid/nonce pairing, then client lookup, redirect_uri
    /// binding, and finally scope intersection. Returns the resolved client
    /// and granted scopes on success.
    pub async fn validate_authorize_request(
        &self,
        params: &AuthorizeParams,
    ) -> Result<(OAuthClient, Vec<String>), OAuthError> {
        if params.response_type != "code" {
            return Err(OAuthError::UnsupportedResponseType);
        }
        if params.client_id.is_empty() || params.redirect_uri.is_empty() {
            return Err(OAuthError::InvalidRequest(
                "client_id and redirect_uri are required".to_string(),
            ));
        }
        if params.scopes.iter().any(|s| s == "openid") && params.nonce.is_none() {
            return Err(OAuthError::InvalidRequest(
                "nonce is required for openid scope".to_string(),
            ));
        }

        let client = self
            .client_repo
            .find_active_by_client_id(&params.client_id)
            .await?
            .ok_or(OAuthError::InvalidClient)?;

        if !client.has_redirect_uri(&params.redirect_uri) {
            return Err(OAuthError::InvalidRedirectUri);
        }

        let granted_scopes = client.intersect_scopes(&params.scopes);
        if granted_scopes.is_empty() {
            return Err(OAuthError::InvalidScope(
                "none of the requested scopes are allowed for this client".to_string(),
            ));
        }

        Ok((client, granted_scopes))
    }

    /// Mint and store an auth code bound to the authenticated user (the
    /// authorize endpoint's success path, after login/consent complete).
    pub async fn issue_authorization_code(
        &self,
        user_id: Uuid,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
        nonce: Option<String>,
        code_challenge: Option<String>,
        code_challenge_method: Option<String>,
    ) -> Result<String, OAuthError> {
        let code = secret::generate_oauth_token_with_length(43);
        let grant = AuthCodeGrant {
            user_id,
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scopes: scopes.to_vec(),
            issued_at: Utc::now(),
            used: false,
            nonce,
            code_challenge,
            code_challenge_method,
            issued_access_token: None,
            issued_refresh_token: None,
        };

        self.grant_store
            .put_auth_code(&code, &grant, self.auth_code_ttl_secs)
            .await?;

        Ok(code)
    }

    /// Exchange an authorization code for tokens (the `authorization_code`
    /// grant at the token endpoint).
    pub async fn exchange_authorization_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<OAuthTokenResponse, OAuthError> {
        let client = self.authenticate_client(client_id, client_secret).await?;

        let grant = self
            .grant_store
            .get_auth_code(code)
            .await?
            .ok_or_else(|| OAuthError::InvalidGrant("Invalid or expired authorization code".to_string()))?;

        if grant.used {
            tracing::warn!(client_id = %client.client_id, "authorization code replay detected");
            self.revoke_issued_tokens(&grant).await?;
            return Err(OAuthError::InvalidGrant("Code already used".to_string()));
        }

        if !uri::uris_equal(&grant.redirect_uri, redirect_uri) {
            return Err(OAuthError::InvalidGrant("Invalid redirect URI".to_string()));
        }
        if grant.client_id != client.client_id {
            return Err(OAuthError::InvalidGrant(
                "Authorization code was not issued to this client".to_string(),
            ));
        }

        Self::check_pkce(
            grant.code_challenge.as_deref(),
            grant.code_challenge_method.as_deref(),
            code_verifier,
        )?;

        // Single-use claim: exactly one concurrent exchange wins this race,
        // independent of the advisory `used` flag on the grant body itself.
        let claimed = self
            .grant_store
            .claim_auth_code(code, self.auth_code_ttl_secs)
            .await?;
        if !claimed {
            return Err(OAuthError::InvalidGrant("Code already used".to_string()));
        }

        let user = self
            .user_repo
            .find_by_id(grant.user_id)
            .await
            .map_err(|e| OAuthError::ServerError(e.to_string()))?
            .ok_or_else(|| OAuthError::InvalidGrant("Invalid or expired authorization code".to_string()))?;

        let (access_token, refresh_token, id_token) = self
            .mint_tokens(&user, &client, &grant.scopes, grant.nonce.clone(), true)
            .await?;

        // Record what was minted against this code so a later replay can
        // be revoked rather than merely rejected (RFC 6749 §4.1.2).
        let mut consumed_grant = grant.clone();
        consumed_grant.used = true;
        consumed_grant.issued_access_token = Some(access_token.clone());
        consumed_grant.issued_refresh_token = refresh_token.clone();
        self.grant_store
            .put_auth_code(code, &consumed_grant, self.auth_code_ttl_secs)
            .await?;

        Ok(OAuthTokenResponse {
            access_token,
            refresh_token,
            id_token,
            token_type: "bearer".to_string(),
            expires_in: self.jwt_manager.access_token_expiry_secs(),
            scope: grant.scopes.join(" "),
        })
    }

    /// Revoke the access/refresh tokens minted the one time a code was
    /// legitimately exchanged, once a replay of that same code is detected.
    async fn revoke_issued_tokens(&self, grant: &AuthCodeGrant) -> Result<(), OAuthError> {
        if let Some(refresh_token) = &grant.issued_refresh_token {
            self.grant_store.delete_refresh_token(refresh_token).await?;
        }
        if let Some(access_token) = &grant.issued_access_token {
            if let Ok(claims) = self.jwt_manager.verify_access_token(access_token) {
                let ttl = claims.exp - Utc::now().timestamp();
                if ttl > 0 {
                    self.grant_store.blacklist_token(access_token, ttl).await?;
                }
            }
        }
        Ok(())
    }

    /// Exchange a refresh token for a fresh access/refresh pair (the
    /// `refresh_token` grant). Never re-issues `id_token`.
    pub async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<OAuthTokenResponse, OAuthError> {
        let record = self
            .grant_store
            .get_refresh_token(refresh_token)
            .await?
            .ok_or_else(|| OAuthError::InvalidGrant("Invalid or expired refresh token".to_string()))?;

        if record.exp < Utc::now() {
            return Err(OAuthError::InvalidGrant("Invalid or expired refresh token".to_string()));
        }

        let client = self
            .client_repo
            .find_by_client_id(&record.client_id)
            .await?
            .ok_or(OAuthError::InvalidClient)?;

        let user = self
            .user_repo
            .find_by_id(record.user_id)
            .await
            .map_err(|e| OAuthError::ServerError(e.to_string()))?
            .ok_or(OAuthError::UserNotFound)?;

        // Rotation: delete-before-mint. If this fails, no new tokens issue.
        let deleted = self.grant_store.delete_refresh_token(refresh_token).await?;
        if !deleted {
            return Err(OAuthError::InvalidGrant("Invalid or expired refresh token".to_string()));
        }

        let (access_token, new_refresh_token, _id_token) = self
            .mint_tokens(&user, &client, &record.scopes, None, false)
            .await?;

        Ok(OAuthTokenResponse {
            access_token,
            refresh_token: new_refresh_token,
            id_token: None,
            token_type: "bearer".to_string(),
            expires_in: self.jwt_manager.access_token_expiry_secs(),
            scope: record.scopes.join(" "),
        })
    }

    /// Resolve a bearer access token to the claims backing the UserInfo
    /// response, honoring the revocation blacklist.
    pub async fn resolve_access_token(
        &self,
        token: &str,
    ) -> Result<crate::utils::jwt::AccessTokenClaims, OAuthError> {
        if self.grant_store.is_blacklisted(token).await? {
            return Err(OAuthError::TokenRevoked);
        }
        Ok(self.jwt_manager.verify_access_token(token)?)
    }

    pub async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, OAuthError> {
        self.user_repo
            .find_by_id(user_id)
            .await
            .map_err(|e| OAuthError::ServerError(e.to_string()))
    }

    /// Blacklist a still-valid bearer token until its natural expiry
    /// (SPEC §4.9). An expired or malformed token is reported to the
    /// caller as a 400 with the matching error code — this does not raise
    /// an exception, it returns a normal `Err`.
    pub async fn revoke_access_token(&self, token: &str) -> Result<(), OAuthError> {
        let claims = self.jwt_manager.verify_access_token(token)?;
        let ttl = claims.exp - Utc::now().timestamp();
        if ttl > 0 {
            self.grant_store.blacklist_token(token, ttl).await?;
        }
        Ok(())
    }

    async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<OAuthClient, OAuthError> {
        let client = self
            .client_repo
            .find_active_by_client_id(client_id)
            .await?
            .ok_or(OAuthError::InvalidClient)?;

        let verified = verify_client_secret(client_secret, &client.client_secret_hash)?;
        if !verified {
            return Err(OAuthError::InvalidClient);
        }

        Ok(client)
    }

    /// Enforce PKCE when the authorize request registered a challenge. A
    /// client that never sent a code_challenge is treated as not using
    /// PKCE, and any verifier presented at the token endpoint is ignored.
    ///
    /// Error mapping follows SPEC §4.5 exactly: a missing verifier or an
    /// unrecognized method is a malformed request (`invalid_request`); a
    /// verifier that simply doesn't match the stored challenge is a failed
    /// grant (`invalid_grant`).
    fn check_pkce(
        code_challenge: Option<&str>,
        code_challenge_method: Option<&str>,
        code_verifier: Option<&str>,
    ) -> Result<(), OAuthError> {
        let Some(challenge) = code_challenge else {
            return Ok(());
        };

        let verifier = code_verifier.ok_or_else(|| {
            OAuthError::InvalidRequest("code_verifier is required".to_string())
        })?;
        let method = code_challenge_method.unwrap_or(pkce::PKCE_METHOD_PLAIN);

        if method != pkce::PKCE_METHOD_S256 && method != pkce::PKCE_METHOD_PLAIN {
            return Err(OAuthError::InvalidRequest(format!(
                "unsupported code_challenge_method: {method}"
            )));
        }

        if pkce::verify_pkce(verifier, challenge, method) {
            Ok(())
        } else {
            Err(OAuthError::InvalidGrant("code_verifier does not match code_challenge".to_string()))
        }
    }

    async fn mint_tokens(
        &self,
        user: &User,
        client: &OAuthClient,
        scopes: &[String],
        nonce: Option<String>,
        issue_id_token: bool,
    ) -> Result<(String, Option<String>, Option<String>), OAuthError> {
        let access_token = self
            .jwt_manager
            .sign_access_token(user.id, &client.client_id, scopes)?;

        let refresh_token = secret::generate_oauth_token_with_length(64);
        let record = RefreshTokenRecord {
            user_id: user.id,
            client_id: client.client_id.clone(),
            scopes: scopes.to_vec(),
            exp: Utc::now() + Duration::seconds(self.refresh_token_expiration_secs),
        };
        self.grant_store
            .put_refresh_token(&refresh_token, &record, self.refresh_token_expiration_secs)
            .await?;

        let id_token = if issue_id_token && scopes.iter().any(|s| s == "openid") {
            Some(self.jwt_manager.sign_id_token(
                &self.issuer_url,
                user.id,
                &client.client_id,
                nonce,
            )?)
        } else {
            None
        };

        Ok((access_token, Some(refresh_token), id_token))
    }
}

#[cfg(test)]
mod tests {
    // Property: PKCE soundness (SPEC §8) — exchange succeeds iff
    // BASE64URL-NOPAD(SHA256(verifier)) == challenge for S256, or a byte
    // match for plain; anything else is rejected with the right error code.

    use super::*;

    const S256_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const S256_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn check_pkce_no_challenge_stored_accepts_any_verifier() {
        assert!(OAuthService::check_pkce(None, None, None).is_ok());
        assert!(OAuthService::check_pkce(None, None, Some("anything")).is_ok());
    }

    #[test]
    fn check_pkce_s256_matching_verifier_succeeds() {
        assert!(OAuthService::check_pkce(
            Some(S256_CHALLENGE),
            Some("S256"),
            Some(S256_VERIFIER)
        )
        .is_ok());
    }

    #[test]
    fn check_pkce_s256_mismatched_verifier_is_invalid_grant() {
        let err = OAuthService::check_pkce(
            Some(S256_CHALLENGE),
            Some("S256"),
            Some("wrong-verifier-wrong-verifier-wrong-verifier"),
        )
        .unwrap_err();
        assert_eq!(err.code(), "invalid_grant");
    }

    #[test]
    fn check_pkce_plain_matching_verifier_succeeds() {
        assert!(OAuthService::check_pkce(Some("abc123"), Some("plain"), Some("abc123")).is_ok());
    }

    #[test]
    fn check_pkce_plain_mismatched_verifier_is_invalid_grant() {
        let err = OAuthService::check_pkce(Some("abc123"), Some("plain"), Some("xyz789"))
            .unwrap_err();
        assert_eq!(err.code(), "invalid_grant");
    }

    #[test]
    fn check_pkce_missing_verifier_is_invalid_request() {
        let err = OAuthService::check_pkce(Some(S256_CHALLENGE), Some("S256"), None).unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn check_pkce_unsupported_method_is_invalid_request() {
        let err = OAuthService::check_pkce(Some("abc123"), Some("md5"), Some("abc123"))
            .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn check_pkce_defaults_to_plain_when_method_absent() {
        assert!(OAuthService::check_pkce(Some("abc123"), None, Some("abc123")).is_ok());
        let err = OAuthService::check_pkce(Some("abc123"), None, Some("xyz789")).unwrap_err();
        assert_eq!(err.code(), "invalid_grant");
    }
}
