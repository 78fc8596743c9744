use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use backoffice_service::{
    build_router,
    config::load_service_config,
    postgres::{PgEmployeeStore, PgPermissionStore, PgTokenStore},
    AppState,
};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_service_config()?;

    let db = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(config.store_timeout)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;

    if config.run_migrations {
        sqlx::migrate!("./migrations").run(&db).await?;
        info!("database migrations applied");
    }

    let origins = config
        .cors_allowed_origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()
        .context("CORS_ALLOWED_ORIGINS contains an invalid origin")?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION]);

    let ip: std::net::IpAddr = config.host.parse().context("HOST is not an IP address")?;
    let addr = SocketAddr::from((ip, config.port));
    let environment = config.environment;

    let state = AppState::new(
        config,
        Arc::new(PgEmployeeStore::new(db.clone())),
        Arc::new(PgTokenStore::new(db.clone())),
        Arc::new(PgPermissionStore::new(db)),
    )?;
    state
        .grant_permission_admins()
        .await
        .context("Failed to grant PERMISSION_ADMIN_IDS")?;
    let app = build_router(state).layer(cors);

    info!(%addr, environment = environment.as_str(), "starting backoffice-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
