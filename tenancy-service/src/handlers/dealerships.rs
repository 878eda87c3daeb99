use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::db::scope::{with_tenant_id, ScopedQuery, ScopedTable};
use crate::middleware::TenantContext;
use crate::models::{CreateDealershipRequest, Dealership, DealershipResponse};
use crate::AppState;

/// List the caller's dealerships. The tenant filter comes from the
/// resolved context, never from the request.
pub async fn list_dealerships(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<Vec<DealershipResponse>>, AppError> {
    let dealerships: Vec<Dealership> = ScopedQuery::select(ScopedTable::Dealerships, &ctx.tenant_id)
        .order_by_newest()
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(dealerships.into_iter().map(Into::into).collect()))
}

/// Fetch one dealership after an explicit ownership check. A missing id
/// and a foreign-tenant id produce the same denial.
pub async fn get_dealership(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(dealership_id): Path<String>,
) -> Result<Json<DealershipResponse>, AppError> {
    let decision = state
        .validator
        .validate_access(&ctx.user_id, ScopedTable::Dealerships, &dealership_id, None)
        .await?;

    if !decision.allowed {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let dealership: Option<Dealership> =
        ScopedQuery::select(ScopedTable::Dealerships, &ctx.tenant_id)
            .and_eq(ScopedTable::Dealerships, "id", &dealership_id)?
            .fetch_optional(&state.pool)
            .await?;

    // The row can vanish between the check and the fetch; keep the
    // denial signal identical either way.
    dealership
        .map(|d| Json(DealershipResponse::from(d)))
        .ok_or_else(|| AppError::Forbidden("Access denied".to_string()))
}

/// Create a dealership under the caller's tenant. Any tenant the client
/// claimed in the body is overwritten by the write guard.
pub async fn create_dealership(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(req): Json<CreateDealershipRequest>,
) -> Result<(StatusCode, Json<DealershipResponse>), AppError> {
    req.validate()?;

    let record = with_tenant_id(Dealership::from_request(req), &ctx.tenant_id);

    sqlx::query(
        "INSERT INTO dealerships (id, tenant_id, name, domain, created_utc) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(&record.id)
    .bind(&record.tenant_id)
    .bind(&record.name)
    .bind(&record.domain)
    .bind(record.created_utc)
    .execute(&state.pool)
    .await?;

    tracing::info!(
        dealership_id = %record.id,
        tenant_id = %record.tenant_id,
        "Dealership created"
    );

    Ok((StatusCode::CREATED, Json(record.into())))
}
