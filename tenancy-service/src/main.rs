use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::logging::init_tracing;
use tenancy_service::{
    build_router,
    config::TenancyConfig,
    db,
    routes::RouteTable,
    services::{
        AccessValidator, AuditLogger, MongoAuditSink, PgOwnershipStore, PgTenantDirectory,
        RedisRevocations, SessionVerifier,
    },
    AppState,
};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = TenancyConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    let metrics_handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        service_core::error::AppError::InternalError(anyhow::anyhow!(
            "Failed to install metrics recorder: {}",
            e
        ))
    })?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting tenancy service"
    );

    tracing::info!("Initializing database connections");
    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await.map_err(|e| {
        service_core::error::AppError::DatabaseError(anyhow::anyhow!(
            "Migrations failed: {}",
            e
        ))
    })?;
    tracing::info!("Database initialized successfully");

    let audit_sink = MongoAuditSink::connect(&config.mongodb.uri, &config.mongodb.database).await?;
    let audit = AuditLogger::new(Arc::new(audit_sink));
    tracing::info!("Audit store initialized");

    let revocations = Arc::new(RedisRevocations::new(&config.redis).await?);
    tracing::info!("Revocation store initialized");

    let identity = Arc::new(SessionVerifier::new(&config.session, revocations.clone())?);

    let directory = Arc::new(PgTenantDirectory::new(pool.clone()));
    let ownership = Arc::new(PgOwnershipStore::new(pool.clone()));
    let validator = AccessValidator::new(directory.clone(), ownership.clone(), audit.clone());

    // Built once; consulted first for every request.
    let route_table = Arc::new(RouteTable::from_config(&config.routes));

    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );
    tracing::info!("Global IP rate limiter initialized");

    let state = AppState {
        config: config.clone(),
        pool,
        routes: route_table,
        identity,
        directory,
        ownership,
        revocations,
        audit,
        validator,
        ip_rate_limiter,
        metrics_handle,
    };

    let app = build_router(state).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    // Give in-flight requests time to complete
    tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
}
