mod config;

use anyhow::Context;
use common::postgres::{
    run_migrations, PostgresClient, PostgresConfig, PostgresDeviceRepository, PostgresMessageStore,
};
use common::telemetry::{init_telemetry, TelemetryConfig};
use crate::config::ServiceConfig;
use std::sync::Arc;
use stu_ingest::domain::{DeviceResolver, IngestConfig, IngestService};
use stu_ingest::http::{app_router, AppState};
use stu_ingest::live::LiveUpdateHub;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&TelemetryConfig {
        log_level: config.log_level.clone(),
        json_output: config.log_json,
    }) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    info!(
        host = %config.http_host,
        port = config.http_port,
        workers = config.ingest_worker_count,
        "Starting satlink server"
    );

    if let Err(e) = run(config).await {
        error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}

async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    info!("Initializing PostgreSQL...");
    let postgres = PostgresClient::new(&PostgresConfig {
        host: config.postgres_host.clone(),
        port: config.postgres_port,
        database: config.postgres_database.clone(),
        username: config.postgres_username.clone(),
        password: config.postgres_password.clone(),
        max_pool_size: config.postgres_pool_size,
    })?;
    postgres.ping().await.context("PostgreSQL is not reachable")?;
    run_migrations(&postgres).await?;

    let device_repository = Arc::new(PostgresDeviceRepository::new(postgres.clone()));
    let message_store = Arc::new(PostgresMessageStore::new(postgres));

    let live = LiveUpdateHub::new(config.live_update_capacity);
    let resolver = Arc::new(DeviceResolver::new(device_repository));
    let ingest = Arc::new(IngestService::new(
        resolver,
        message_store,
        Arc::new(live.clone()),
        IngestConfig {
            worker_count: config.ingest_worker_count,
            queue_capacity: config.ingest_queue_capacity,
        },
    ));

    let router = app_router(AppState { ingest, live });

    let addr = format!("{}:{}", config.http_host, config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
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
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
