use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::OAuthError;
use crate::models::OAuthClient;
use crate::utils::password;

/// Resolves `client_id` to a registered `Application` (C3).
///
/// Administrative CRUD of clients (update/deactivate/list/delete) is out of
/// scope for this implementation's HTTP surface; clients are provisioned
/// out-of-band by `src/bin/seed_client.rs`, which uses `create` directly.
#[derive(Clone)]
pub struct OAuthClientRepository {
    pool: MySqlPool,
}

impl OAuthClientRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Provision a new client. Used only by the seed binary.
    pub async fn create(
        &self,
        client_id: &str,
        client_secret_hash: &str,
        name: &str,
        redirect_uris: &[String],
        allowed_scopes: &[String],
    ) -> Result<OAuthClient, OAuthError> {
        let id = Uuid::new_v4();
        let redirect_uris_json = serde_json::to_value(redirect_uris)?;
        let allowed_scopes_json = serde_json::to_value(allowed_scopes)?;

        sqlx::query(
            r#"
            INSERT INTO oauth_clients (id, client_id, client_secret_hash, name, redirect_uris, allowed_scopes)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(client_id)
        .bind(client_secret_hash)
        .bind(name)
        .bind(&redirect_uris_json)
        .bind(&allowed_scopes_json)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().map(|c| c == "23000").unwrap_or(false)
                    || db_err.message().contains("Duplicate entry")
                {
                    return OAuthError::InvalidRequest("client_id already exists".to_string());
                }
            }
            OAuthError::ServerError(format!("database error: {}", e))
        })?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| OAuthError::ServerError("failed to fetch created client".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OAuthClient>, OAuthError> {
        let client = sqlx::query_as::<_, OAuthClient>(
            r#"
            SELECT id, client_id, client_secret_hash, name, redirect_uris, allowed_scopes, is_active, created_at
            FROM oauth_clients
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }

    /// Find a client by its public identifier, regardless of activation
    /// state. Used by the token endpoint so a deactivated client still gets
    /// a proper `invalid_client` rather than a generic lookup failure.
    pub async fn find_by_client_id(&self, client_id: &str) -> Result<Option<OAuthClient>, OAuthError> {
        let client = sqlx::query_as::<_, OAuthClient>(
            r#"
            SELECT id, client_id, client_secret_hash, name, redirect_uris, allowed_scopes, is_active, created_at
            FROM oauth_clients
            WHERE client_id = ?
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }

    /// Find an active client by its public identifier (C3 `find`).
    pub async fn find_active_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<OAuthClient>, OAuthError> {
        let client = sqlx::query_as::<_, OAuthClient>(
            r#"
            SELECT id, client_id, client_secret_hash, name, redirect_uris, allowed_scopes, is_active, created_at
            FROM oauth_clients
            WHERE client_id = ? AND is_active = true
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }
}

/// Verify a presented client secret against the stored Argon2id hash
/// (C3 `verify_secret`). Delegates to the same KDF used for user passwords.
pub fn verify_client_secret(presented: &str, hash: &str) -> Result<bool, OAuthError> {
    password::verify_password(presented, hash)
        .map_err(|e| OAuthError::ServerError(format!("secret verification failed: {}", e)))
}

/// Hash a freshly generated client secret for storage. Used only by the
/// seed binary.
pub fn hash_client_secret(secret: &str) -> Result<String, OAuthError> {
    password::hash_password(secret)
        .map_err(|e| OAuthError::ServerError(format!("secret hashing failed: {}", e)))
}
