use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::db::scope::{ScopedQuery, ScopedTable};
use crate::middleware::TenantContext;
use crate::models::{Report, ReportResponse};
use crate::AppState;

pub async fn list_reports(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<Vec<ReportResponse>>, AppError> {
    let reports: Vec<Report> = ScopedQuery::select(ScopedTable::Reports, &ctx.tenant_id)
        .order_by_newest()
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(reports.into_iter().map(Into::into).collect()))
}

pub async fn get_report(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(report_id): Path<String>,
) -> Result<Json<ReportResponse>, AppError> {
    let decision = state
        .validator
        .validate_access(&ctx.user_id, ScopedTable::Reports, &report_id, None)
        .await?;

    if !decision.allowed {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let report: Option<Report> = ScopedQuery::select(ScopedTable::Reports, &ctx.tenant_id)
        .and_eq(ScopedTable::Reports, "id", &report_id)?
        .fetch_optional(&state.pool)
        .await?;

    report
        .map(|r| Json(ReportResponse::from(r)))
        .ok_or_else(|| AppError::Forbidden("Access denied".to_string()))
}
