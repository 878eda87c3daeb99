use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{db, AppState};

/// Service health check: Postgres, the audit store, and the revocation
/// list must all answer.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    db::health_check(&state.pool).await.map_err(|e| {
        tracing::error!(error = %e, "PostgreSQL health check failed");
        AppError::from(e)
    })?;

    state.audit.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Audit store health check failed");
        e
    })?;

    state.revocations.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Revocation store health check failed");
        e
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "postgresql": "up",
            "mongodb": "up",
            "redis": "up"
        }
    })))
}
