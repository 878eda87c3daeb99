pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use service_core::axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, rate_limit::ip_rate_limit_middleware,
    rate_limit::IpRateLimiter, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::TenancyConfig;
use crate::routes::RouteTable;
use crate::services::{
    AccessValidator, AuditLogger, IdentityResolver, OwnershipStore, RevocationStore,
    TenantDirectory,
};

/// Shared application state. Every store sits behind a trait object so
/// tests can swap in in-memory fakes without touching the router.
#[derive(Clone)]
pub struct AppState {
    pub config: TenancyConfig,
    pub pool: PgPool,
    pub routes: Arc<RouteTable>,
    pub identity: Arc<dyn IdentityResolver>,
    pub directory: Arc<dyn TenantDirectory>,
    pub ownership: Arc<dyn OwnershipStore>,
    pub revocations: Arc<dyn RevocationStore>,
    pub audit: AuditLogger,
    pub validator: AccessValidator,
    pub ip_rate_limiter: IpRateLimiter,
    pub metrics_handle: PrometheusHandle,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Operator-only forensic review.
    let admin_routes = Router::new()
        .route("/api/audit/violations", get(handlers::audit::list_violations))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_auth_middleware,
        ));

    let ip_limiter = state.ip_rate_limiter.clone();

    let app = Router::new()
        .route("/api/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/api/stripe/webhook", post(handlers::webhooks::stripe_webhook))
        .route("/api/clerk/webhook", post(handlers::webhooks::clerk_webhook))
        .route(
            "/api/dealerships",
            get(handlers::dealerships::list_dealerships)
                .post(handlers::dealerships::create_dealership),
        )
        .route(
            "/api/dealerships/:dealership_id",
            get(handlers::dealerships::get_dealership),
        )
        .route("/api/reports", get(handlers::reports::list_reports))
        .route("/api/reports/:report_id", get(handlers::reports::get_report))
        .merge(admin_routes)
        .with_state(state.clone())
        // The isolation gate fronts every route; classification decides
        // which ones it waves through.
        .layer(from_fn_with_state(
            state.clone(),
            middleware::tenant_isolation_middleware,
        ))
        // Global IP rate limiting
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        // Request metrics
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .map(|o| {
                            o.parse::<service_core::axum::http::HeaderValue>()
                                .unwrap_or_else(|e| {
                                    tracing::error!(
                                        "Invalid CORS origin '{}': {}. Using fallback.",
                                        o,
                                        e
                                    );
                                    service_core::axum::http::HeaderValue::from_static("*")
                                })
                        })
                        .collect::<Vec<service_core::axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    service_core::axum::http::Method::GET,
                    service_core::axum::http::Method::POST,
                    service_core::axum::http::Method::PATCH,
                    service_core::axum::http::Method::DELETE,
                    service_core::axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    service_core::axum::http::header::AUTHORIZATION,
                    service_core::axum::http::header::CONTENT_TYPE,
                    service_core::axum::http::header::HeaderName::from_static("x-admin-api-key"),
                    service_core::axum::http::header::HeaderName::from_static(
                        "x-webhook-timestamp",
                    ),
                    service_core::axum::http::header::HeaderName::from_static(
                        "x-webhook-signature",
                    ),
                ]),
        );

    Ok(app)
}
