//! Liveness endpoint.

use axum::Json;

use crate::models::HealthResponse;

/// `GET /healthz`
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: vitrine_core::version().to_string(),
    })
}
