//! GET /jwks (C11). Degenerate for HS256: this issuer signs
//! with a shared symmetric secret, so there is no public key material to
//! publish. Kept as a real endpoint (rather than omitted) so clients that
//! unconditionally fetch the discovery document's `jwks_uri` don't 404.

use axum::{response::IntoResponse, Json};
use serde_json::json;

pub async fn jwks_handler() -> impl IntoResponse {
    Json(json!({ "keys": [] }))
}
