//! Tenant context attached to allowed requests.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use service_core::error::AppError;

/// The caller's resolved identity and tenant, inserted by the gate.
/// Everything downstream scopes on `tenant_id`; nothing downstream
/// re-resolves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub user_id: String,
    pub tenant_id: String,
}

/// Extractor for handlers on protected routes:
/// ```ignore
/// async fn handler(ctx: TenantContext) -> impl IntoResponse {
///     // queries scoped to ctx.tenant_id
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Tenant context not found")))
    }
}
