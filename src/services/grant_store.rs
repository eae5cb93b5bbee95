//! The ephemeral, TTL-bounded key-value store (C2) backing auth codes,
//! refresh tokens, the access-token revocation blacklist, email-verification
//! tokens, and the OIDC session context used for the login detour/resume.
//!
//! Backed by Redis so single-use and at-most-once-rotation guarantees hold
//! across replicas; there is deliberately no in-memory fallback, since that
//! would silently break those guarantees under horizontal scale-out.

use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::error::OAuthError;

const AUTH_CODE_PREFIX: &str = "auth_code:";
const AUTH_CODE_CLAIMED_SUFFIX: &str = ":claimed";
const REFRESH_TOKEN_PREFIX: &str = "refresh_token:";
const BLACKLISTED_TOKEN_PREFIX: &str = "blacklisted_token:";
const EMAIL_VERIFICATION_PREFIX: &str = "email_verification:";
const OIDC_CTX_PREFIX: &str = "oidc_ctx:";

/// An authorization-code grant bound at issuance time (SPEC §3 AuthCode
/// grant). The advisory `used` flag is carried for observability only;
/// the actual single-use invariant is enforced by the separate
/// `auth_code:<c>:claimed` claim key, not by this flag.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct AuthCodeGrant {
    pub user_id: Uuid,
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub issued_at: DateTime<Utc>,
    pub used: bool,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    /// Tokens minted the one time this code was successfully exchanged.
    /// Recorded so a detected replay can revoke them (RFC 6749 §4.1.2),
    /// not just reject the second presentation.
    #[serde(default)]
    pub issued_access_token: Option<String>,
    #[serde(default)]
    pub issued_refresh_token: Option<String>,
}

/// A refresh-token record (SPEC §3 RefreshToken record).
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct RefreshTokenRecord {
    pub user_id: Uuid,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub exp: DateTime<Utc>,
}

/// The in-progress authorize request persisted across a login detour
/// (SPEC §3 OIDC session context, §4.6 resume).
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct OidcSessionContext {
    pub client_id: String,
    pub redirect_uri: String,
    pub state: Option<String>,
    pub scope: Option<String>,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Thin typed wrapper over a Redis connection. Every write takes an
/// explicit TTL; there is no untimed `put`.
#[derive(Clone)]
pub struct GrantStore {
    conn: ConnectionManager,
}

impl GrantStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    async fn put_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: i64,
    ) -> Result<(), OAuthError> {
        let payload = serde_json::to_string(value)?;
        let mut conn = self.conn.clone();
        let ttl: u64 = ttl_secs.max(1) as u64;
        conn.set_ex::<_, _, ()>(key, payload, ttl).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, OAuthError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, OAuthError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    /// Atomically claim a key: succeeds (returns `true`) iff the key did
    /// not already exist. Implemented via Redis `SET key 1 NX EX ttl`,
    /// which is atomic at the server — this is the single primitive the
    /// single-use auth-code invariant rests on, independent of any
    /// advisory flag carried in the code's own JSON body.
    async fn claim(&self, key: &str, ttl_secs: i64) -> Result<bool, OAuthError> {
        let mut conn = self.conn.clone();
        let ttl: u64 = ttl_secs.max(1) as u64;
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl)
            .query_async(&mut conn)
            .await?;
        Ok(result.is_some())
    }

    // -- Auth codes ---------------------------------------------------

    pub async fn put_auth_code(
        &self,
        code: &str,
        grant: &AuthCodeGrant,
        ttl_secs: i64,
    ) -> Result<(), OAuthError> {
        self.put_json(&format!("{AUTH_CODE_PREFIX}{code}"), grant, ttl_secs)
            .await
    }

    pub async fn get_auth_code(&self, code: &str) -> Result<Option<AuthCodeGrant>, OAuthError> {
        self.get_json(&format!("{AUTH_CODE_PREFIX}{code}")).await
    }

    /// Attempt to mark `code` as single-use-consumed. Returns `true` for
    /// exactly one caller across any interleaving of concurrent exchanges.
    pub async fn claim_auth_code(&self, code: &str, ttl_secs: i64) -> Result<bool, OAuthError> {
        self.claim(
            &format!("{AUTH_CODE_PREFIX}{code}{AUTH_CODE_CLAIMED_SUFFIX}"),
            ttl_secs,
        )
        .await
    }

    pub async fn delete_auth_code(&self, code: &str) -> Result<(), OAuthError> {
        self.delete(&format!("{AUTH_CODE_PREFIX}{code}")).await?;
        Ok(())
    }

    // -- Refresh tokens -------------------------------------------------

    pub async fn put_refresh_token(
        &self,
        token: &str,
        record: &RefreshTokenRecord,
        ttl_secs: i64,
    ) -> Result<(), OAuthError> {
        self.put_json(&format!("{REFRESH_TOKEN_PREFIX}{token}"), record, ttl_secs)
            .await
    }

    pub async fn get_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, OAuthError> {
        self.get_json(&format!("{REFRESH_TOKEN_PREFIX}{token}"))
            .await
    }

    /// Delete the refresh record. Rotation always attempts this *before*
    /// minting the successor; if the delete fails the caller must not
    /// issue new tokens (SPEC §4.7 refresh_token path step 5).
    pub async fn delete_refresh_token(&self, token: &str) -> Result<bool, OAuthError> {
        self.delete(&format!("{REFRESH_TOKEN_PREFIX}{token}")).await
    }

    // -- Revocation (access-token blacklist) -----------------------------

    pub async fn blacklist_token(&self, token: &str, ttl_secs: i64) -> Result<(), OAuthError> {
        if ttl_secs <= 0 {
            return Ok(());
        }
        self.put_json(&format!("{BLACKLISTED_TOKEN_PREFIX}{token}"), &1u8, ttl_secs)
            .await
    }

    pub async fn is_blacklisted(&self, token: &str) -> Result<bool, OAuthError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn
            .exists(format!("{BLACKLISTED_TOKEN_PREFIX}{token}"))
            .await?;
        Ok(exists)
    }

    // -- Email verification ---------------------------------------------

    pub async fn put_email_verification(
        &self,
        token: &str,
        user_id: Uuid,
        ttl_secs: i64,
    ) -> Result<(), OAuthError> {
        self.put_json(
            &format!("{EMAIL_VERIFICATION_PREFIX}{token}"),
            &user_id,
            ttl_secs,
        )
        .await
    }

    /// Single-use read: consumes the token as part of the read.
    pub async fn take_email_verification(&self, token: &str) -> Result<Option<Uuid>, OAuthError> {
        let key = format!("{EMAIL_VERIFICATION_PREFIX}{token}");
        let user_id: Option<Uuid> = self.get_json(&key).await?;
        if user_id.is_some() {
            self.delete(&key).await?;
        }
        Ok(user_id)
    }

    // -- OIDC session context (login detour/resume) ----------------------

    pub async fn put_session_context(
        &self,
        session_key: &str,
        ctx: &OidcSessionContext,
        ttl_secs: i64,
    ) -> Result<(), OAuthError> {
        self.put_json(&format!("{OIDC_CTX_PREFIX}{session_key}"), ctx, ttl_secs)
            .await
    }

    pub async fn get_session_context(
        &self,
        session_key: &str,
    ) -> Result<Option<OidcSessionContext>, OAuthError> {
        self.get_json(&format!("{OIDC_CTX_PREFIX}{session_key}"))
            .await
    }

    pub async fn delete_session_context(&self, session_key: &str) -> Result<(), OAuthError> {
        self.delete(&format!("{OIDC_CTX_PREFIX}{session_key}")).await?;
        Ok(())
    }

    /// Liveness check for `/ready` (SPEC §4.12).
    pub async fn ping(&self) -> Result<(), OAuthError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Properties exercised here (SPEC §8):
    // - Single-use code: `claim_auth_code` succeeds for exactly one caller.
    // - Refresh rotation: delete-before-mint leaves no trace of the old
    //   record once rotated.
    // - Revocation visibility: a blacklisted token is visible immediately
    //   and not before it is written.
    //
    // Gated on REDIS_URL like `repositories::user`'s tests are gated on
    // DATABASE_URL: these need a live Redis, not a mock, since the
    // single-use guarantee is a property of the server's atomic `SET NX`,
    // not of this client code.

    use super::*;

    async fn setup_store() -> GrantStore {
        dotenvy::dotenv().ok();
        let redis_url = std::env::var("REDIS_URL").expect("REDIS_URL must be set for tests");
        let client = redis::Client::open(redis_url).expect("invalid REDIS_URL");
        let conn = ConnectionManager::new(client)
            .await
            .expect("failed to connect to redis");
        GrantStore::new(conn)
    }

    fn sample_grant(client_id: &str, redirect_uri: &str) -> AuthCodeGrant {
        AuthCodeGrant {
            user_id: Uuid::new_v4(),
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scopes: vec!["openid".to_string()],
            issued_at: Utc::now(),
            used: false,
            nonce: None,
            code_challenge: None,
            code_challenge_method: None,
            issued_access_token: None,
            issued_refresh_token: None,
        }
    }

    #[tokio::test]
    async fn claim_auth_code_admits_exactly_one_winner() {
        let store = setup_store().await;
        let code = format!("test-code-{}", Uuid::new_v4());
        store
            .put_auth_code(&code, &sample_grant("cid", "https://rp.test/cb"), 60)
            .await
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let code = code.clone();
                tokio::spawn(async move { store.claim_auth_code(&code, 60).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), Ok(true)) {
                successes += 1;
            }
        }
        assert_eq!(successes, 1, "exactly one concurrent claim should win");
    }

    #[tokio::test]
    async fn get_auth_code_round_trips_the_stored_grant() {
        let store = setup_store().await;
        let code = format!("test-code-{}", Uuid::new_v4());
        let grant = sample_grant("cid", "https://rp.test/cb");
        store.put_auth_code(&code, &grant, 60).await.unwrap();

        let fetched = store.get_auth_code(&code).await.unwrap().unwrap();
        assert_eq!(fetched.client_id, grant.client_id);
        assert_eq!(fetched.redirect_uri, grant.redirect_uri);
        assert!(!fetched.used);
    }

    #[tokio::test]
    async fn refresh_token_rotation_deletes_the_old_record() {
        let store = setup_store().await;
        let token = format!("test-refresh-{}", Uuid::new_v4());
        let record = RefreshTokenRecord {
            user_id: Uuid::new_v4(),
            client_id: "cid".to_string(),
            scopes: vec!["openid".to_string()],
            exp: Utc::now() + chrono::Duration::seconds(3600),
        };
        store.put_refresh_token(&token, &record, 3600).await.unwrap();

        let deleted = store.delete_refresh_token(&token).await.unwrap();
        assert!(deleted, "first delete should find and remove the record");

        let deleted_again = store.delete_refresh_token(&token).await.unwrap();
        assert!(!deleted_again, "second delete of the same token finds nothing");

        assert!(store.get_refresh_token(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blacklist_token_is_visible_immediately_and_not_before() {
        let store = setup_store().await;
        let token = format!("test-access-{}", Uuid::new_v4());

        assert!(!store.is_blacklisted(&token).await.unwrap());

        store.blacklist_token(&token, 60).await.unwrap();
        assert!(store.is_blacklisted(&token).await.unwrap());
    }

    #[tokio::test]
    async fn blacklist_token_with_non_positive_ttl_is_a_no_op() {
        let store = setup_store().await;
        let token = format!("test-expired-{}", Uuid::new_v4());

        store.blacklist_token(&token, 0).await.unwrap();
        assert!(!store.is_blacklisted(&token).await.unwrap());
    }

    #[tokio::test]
    async fn email_verification_token_is_single_use() {
        let store = setup_store().await;
        let token = format!("test-verify-{}", Uuid::new_v4());
        let user_id = Uuid::new_v4();

        store.put_email_verification(&token, user_id, 60).await.unwrap();

        let first = store.take_email_verification(&token).await.unwrap();
        assert_eq!(first, Some(user_id));

        let second = store.take_email_verification(&token).await.unwrap();
        assert_eq!(second, None, "a consumed verification token must not be reusable");
    }
}
