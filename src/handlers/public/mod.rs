// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Service banner and health check. Everything else lives under protected.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / - Service banner
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "ForRisco API",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": format!("{:?}", state.config.environment).to_lowercase(),
            "endpoints": {
                "health": "/health (public)",
                "plans": "/api/plan-risk[/:id] (protected)",
                "units": "/api/unit[/:id] (protected)",
                "risks": "/api/risk[/:id[/:collection]] (protected)",
                "processes": "/api/process[/:id] (protected)",
                "backup": "/company/export, /company/restore (protected)",
            }
        }
    }))
}

/// GET /health - Store health, 503 when degraded
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "Banco de dados indisponível",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
