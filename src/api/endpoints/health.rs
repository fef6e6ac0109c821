//! Liveness check.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

/// `GET /health`: unauthenticated; reports whether the history database opens.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    let database = match ctx.open_db() {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Health check: database unavailable");
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: "ok",
        database,
        version: crate::config::APP_VERSION,
    })
}
