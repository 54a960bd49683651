//! Health check handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub database: &'static str,
    /// Reported only; the gateway being down does not make the service unready
    pub gateway: &'static str,
}

/// Liveness probe
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe; fails only when the database is unreachable
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, StatusCode> {
    if let Err(e) = sqlx::query("SELECT 1").execute(&state.pool).await {
        tracing::error!(error = ?e, "Database health check failed");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let gateway = match state.gateway.authenticate_admin().await {
        Ok(()) => "authenticated",
        Err(e) => {
            tracing::warn!(error = %e, "Gateway admin session unavailable");
            "unavailable"
        }
    };

    Ok(Json(ReadyResponse {
        status: "ready",
        database: "connected",
        gateway,
    }))
}
