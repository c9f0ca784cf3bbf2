//! Accumulation status API server
//!
//! # Environment Variables
//!
//! * `API_HOST` / `API_PORT` - bind address (default 0.0.0.0:8080)
//! * `API_JWT_SECRET` - JWT signing secret
//! * `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_LOG_LEVEL` / `API_LOG_FORMAT` - `info`, `debug`...; `text` or `json`

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use infra_db::{create_pool, run_migrations, PostgresAccumulationStore};
use interface_api::{config::ApiConfig, create_router, telemetry::init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("loading API_* configuration")?;
    init_tracing(&config.log_level, &config.log_format);

    tracing::info!(host = %config.host, port = config.port, "Starting accumulation status API");

    let pool = create_pool(config.database_config())
        .await
        .context("connecting to database")?;
    run_migrations(&pool).await.context("running migrations")?;

    let store = Arc::new(PostgresAccumulationStore::new(pool));
    let app = create_router(store.clone(), store, config.clone());

    let addr: SocketAddr = config.server_addr().parse().context("parsing bind address")?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
