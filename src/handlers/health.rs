//! Ambient liveness/readiness pair (SPEC §4.12), kept at the same placement
//! the teacher's `main.rs` already uses.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::config::AppState;
use crate::services::grant_store::GrantStore;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Pings both the relational pool and the grant store; 200 only if both
/// respond.
pub async fn ready_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    GrantStore::new(state.redis.clone())
        .ping()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(HealthResponse {
        status: "ready",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
