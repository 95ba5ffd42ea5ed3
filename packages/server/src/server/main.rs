// Main entry point for API server

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use server_core::common::auth::JwtService;
use server_core::common::rate_limit::FixedWindowRateLimiter;
use server_core::domains::escalation::actions::ScanParams;
use server_core::kernel::scheduled_tasks::start_scheduler;
use server_core::kernel::{
    PostgresAuditLog, PostgresDispatcher, PostgresStore, RandomTokenSource, ServerDeps,
    SignedUrlService, SystemClock,
};
use server_core::server::build_app;
use server_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CareLink API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Assemble dependencies
    let deps = ServerDeps::new(
        Arc::new(PostgresStore::new(pool.clone())),
        Arc::new(PostgresAuditLog::new(pool.clone())),
        Arc::new(PostgresDispatcher::new(pool.clone())),
        Arc::new(SignedUrlService::new(
            config.media_base_url.clone(),
            config.media_signing_secret.clone(),
        )),
        Arc::new(SystemClock),
        Arc::new(RandomTokenSource),
        Arc::new(FixedWindowRateLimiter::new()),
        config.app_domain.clone(),
    );

    let scan_params = ScanParams {
        grace: Duration::minutes(config.escalation_grace_minutes),
        batch_limit: config.escalation_batch_limit,
    };

    // Start scheduled tasks (escalation scan)
    let _scheduler = start_scheduler(deps.clone(), scan_params)
        .await
        .context("Failed to start scheduler")?;

    // Build application
    let jwt_service = Arc::new(JwtService::new(&config.jwt_secret, config.jwt_issuer.clone()));
    let app = build_app(
        pool,
        deps,
        jwt_service,
        config.cron_secret.clone(),
        scan_params,
    );

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
