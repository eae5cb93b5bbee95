use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::uri;

/// A registered Relying Party (SPEC §3 Application).
///
/// Created out-of-band via the seed binary (`src/bin/seed_client.rs`);
/// `client_id`/`client_secret_hash` never change post-issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClient {
    pub id: Uuid,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret_hash: String,
    pub name: String,
    pub redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct OAuthClientRow {
    pub id: String,
    pub client_id: String,
    pub client_secret_hash: String,
    pub name: String,
    pub redirect_uris: serde_json::Value,
    pub allowed_scopes: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<OAuthClientRow> for OAuthClient {
    fn from(row: OAuthClientRow) -> Self {
        Self {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            client_id: row.client_id,
            client_secret_hash: row.client_secret_hash,
            name: row.name,
            redirect_uris: serde_json::from_value(row.redirect_uris).unwrap_or_default(),
            allowed_scopes: serde_json::from_value(row.allowed_scopes).unwrap_or_default(),
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> for OAuthClient {
    fn from_row(row: &'r sqlx::mysql::MySqlRow) -> Result<Self, sqlx::Error> {
        let oauth_client_row = OAuthClientRow::from_row(row)?;
        Ok(OAuthClient::from(oauth_client_row))
    }
}

impl OAuthClient {
    /// Whether `uri` equals one of this client's registered redirect URIs
    /// after normalization (C1).
    pub fn has_redirect_uri(&self, candidate: &str) -> bool {
        self.redirect_uris
            .iter()
            .any(|u| uri::uris_equal(u, candidate))
    }

    /// Intersection of `requested` scopes with this client's allowed
    /// scopes, preserving the order requested scopes were presented in.
    pub fn intersect_scopes(&self, requested: &[String]) -> Vec<String> {
        requested
            .iter()
            .filter(|s| self.allowed_scopes.iter().any(|a| a == *s))
            .cloned()
            .collect()
    }
}
