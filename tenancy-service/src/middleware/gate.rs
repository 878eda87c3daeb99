//! Route isolation gate.
//!
//! Every inbound request traverses one pass of the decision sequence
//! before any handler runs: classify the path, resolve the identity,
//! resolve the tenant. Public and webhook routes terminate at
//! classification; protected routes either pick up a `TenantContext` or
//! are denied here.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde_json::json;
use service_core::error::AppError;

use crate::middleware::TenantContext;
use crate::routes::{RouteClass, RouteTable};
use crate::services::{IdentityResolver, TenantAssignment, TenantDirectory};
use crate::AppState;

/// Terminal state of the gate for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Public or webhook route: no identity work was performed.
    Bypass(RouteClass),
    /// Protected route, caller resolved to a tenant member.
    Allow(TenantContext),
    /// Protected route, terminal denial.
    Deny(Denial),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denial {
    pub status: StatusCode,
    pub message: &'static str,
    reason: &'static str,
}

/// Anonymous request to a protected route: missing credentials, not a
/// violation.
const DENY_UNAUTHENTICATED: Denial = Denial {
    status: StatusCode::UNAUTHORIZED,
    message: "Unauthorized",
    reason: "unauthenticated",
};

/// Known session but no tenant assignment: provisioned wrong, not an
/// attack. Distinct code from 401 so the client knows re-authenticating
/// will not help.
const DENY_UNPROVISIONED: Denial = Denial {
    status: StatusCode::FORBIDDEN,
    message: "Access denied",
    reason: "unprovisioned",
};

/// Run the gate's decision sequence for one request.
///
/// Classification comes first and is terminal for public and webhook
/// paths; the identity resolver must not be consulted for those. Store
/// errors propagate so that uncertainty denies instead of allowing.
pub async fn enforce_tenant_isolation(
    routes: &RouteTable,
    identity: &dyn IdentityResolver,
    directory: &dyn TenantDirectory,
    path: &str,
    session_token: Option<&str>,
) -> Result<GateDecision, AppError> {
    match routes.classify(path) {
        class @ (RouteClass::Public | RouteClass::Webhook) => Ok(GateDecision::Bypass(class)),
        RouteClass::Protected => {
            let user_id = match identity.resolve(session_token).await? {
                Some(user_id) => user_id,
                None => return Ok(GateDecision::Deny(DENY_UNAUTHENTICATED)),
            };

            match directory.tenant_for(&user_id).await? {
                TenantAssignment::Member(tenant_id) => Ok(GateDecision::Allow(TenantContext {
                    user_id,
                    tenant_id,
                })),
                TenantAssignment::Orphaned | TenantAssignment::UnknownUser => {
                    tracing::debug!(user_id = %user_id, path = %path, "Authenticated user has no tenant");
                    Ok(GateDecision::Deny(DENY_UNPROVISIONED))
                }
            }
        }
    }
}

/// Axum middleware wrapping [`enforce_tenant_isolation`]. On allow, the
/// resolved `TenantContext` rides the request extensions for handlers and
/// extractors downstream.
pub async fn tenant_isolation_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let token = extract_session_token(req.headers());

    let decision = enforce_tenant_isolation(
        &state.routes,
        state.identity.as_ref(),
        state.directory.as_ref(),
        &path,
        token.as_deref(),
    )
    .await;

    match decision {
        Ok(GateDecision::Bypass(_)) => next.run(req).await,
        Ok(GateDecision::Allow(ctx)) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Ok(GateDecision::Deny(denial)) => {
            counter!(
                "tenant_isolation_denials_total",
                &[("reason", denial.reason.to_string())]
            )
            .increment(1);
            (denial.status, Json(json!({ "error": denial.message }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Pull the session credential off the request: `Authorization: Bearer`
/// first, then the identity provider's `__session` cookie.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    {
        return Some(token.to_string());
    }

    headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|cookie| {
                cookie
                    .trim()
                    .strip_prefix("__session=")
                    .map(|v| v.to_string())
            })
        })
}
