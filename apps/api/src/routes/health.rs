use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::state::AppState;

/// GET /
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "AI Resume Evaluator API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "healthy"
    }))
}

/// GET /health
/// Pings Postgres and Redis and reports the evaluation queue depth.
pub async fn health_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| AppError::Unhealthy(format!("database: {e}")))?;

    state
        .queue
        .ping()
        .await
        .map_err(|e| AppError::Unhealthy(format!("redis: {e}")))?;

    let depth = state
        .queue
        .depth()
        .await
        .map_err(|e| AppError::Unhealthy(format!("queue: {e}")))?;

    Ok(Json(json!({
        "status": "healthy",
        "database": "connected",
        "redis": "connected",
        "queue": depth,
        "version": env!("CARGO_PKG_VERSION")
    })))
}
