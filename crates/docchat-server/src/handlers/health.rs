use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::services::conversation::RegistryStats;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    status: String,
    db_dir_writable: bool,
    registry: RegistryStats,
}

pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Ready when the history directory exists and is writable.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let registry = state.conversation_manager.registry();
    let db_dir_writable = tokio::fs::metadata(registry.db_dir())
        .await
        .map(|m| m.is_dir() && !m.permissions().readonly())
        .unwrap_or(false);

    let status = if db_dir_writable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            status: if db_dir_writable { "ready" } else { "unavailable" }.to_string(),
            db_dir_writable,
            registry: registry.stats(),
        }),
    )
}
