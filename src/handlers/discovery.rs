//! GET /.well-known/openid-configuration — Discovery (C10). Grounded on the
//! teacher's `handlers/oauth.rs::openid_configuration_handler`, extended
//! with `jwks_uri`/`id_token_signing_alg_values_supported`/`claims_supported`
//! since this implementation actually issues ID tokens (SPEC §4.10).

use axum::{extract::State, response::IntoResponse, Json};

use crate::config::AppState;
use crate::dto::oauth::OpenIdConfiguration;

pub async fn openid_configuration_handler(State(state): State<AppState>) -> impl IntoResponse {
    let scopes = vec![
        "openid".to_string(),
        "email".to_string(),
        "profile".to_string(),
    ];
    Json(OpenIdConfiguration::new(&state.config.issuer_url, scopes))
}
