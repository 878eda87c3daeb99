use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;

use crate::models::ViolationResponse;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ViolationsQuery {
    pub limit: Option<i64>,
}

/// Forensic review of recent cross-tenant violation records, newest
/// first. Operator-only; sits behind the admin key middleware.
pub async fn list_violations(
    State(state): State<AppState>,
    Query(query): Query<ViolationsQuery>,
) -> Result<Json<Vec<ViolationResponse>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let records = state.audit.recent(limit).await?;

    Ok(Json(records.into_iter().map(Into::into).collect()))
}
