//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sorawm_api::{create_router, metrics, ApiConfig, AppState};
use sorawm_media::{build_remover, RemoverConfig};
use sorawm_worker::WorkerConfig;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();
    info!("Starting sorawm-api");

    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sorawm_api=info,sorawm_worker=info,sorawm_media=info,sorawm_storage=info,tower_http=warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    info!(
        "API config: host={}, port={}, data_dir={}, daily_quota={}, max_jobs={}",
        config.host,
        config.port,
        config.data_dir.display(),
        config.daily_quota,
        worker_config.max_concurrent_jobs
    );

    // A server that cannot run removals must not accept uploads.
    let remover_config =
        RemoverConfig::from_env().map_err(|e| anyhow!("Server misconfigured: {}", e))?;
    let remover = build_remover(&remover_config)
        .map_err(|e| anyhow!("Server misconfigured: {}", e))?;
    remover
        .check_available()
        .map_err(|e| anyhow!("Server misconfigured: {} backend unavailable: {}", remover.name(), e))?;

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("Failed to install Prometheus recorder")?)
    } else {
        None
    };

    let state = AppState::new(config.clone(), worker_config, remover)
        .await
        .context("Failed to prepare data directory")?;
    let dispatcher = Arc::clone(&state.dispatcher);

    let app = create_router(state, metrics_handle);

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address()))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    if !dispatcher.shutdown(config.shutdown_timeout).await {
        warn!("Exiting with jobs still running");
    }
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for CTRL+C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Received shutdown signal");
}
