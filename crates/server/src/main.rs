mod api;
mod metrics;
mod proxy;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plumbline_core::{
    load_config, register_status_functions, validate_config, MonitorOutcome, PipelineMonitor,
    ProcessingStatus, ProxyServer, StatusHandle,
};

use api::create_router;
use proxy::HttpProxyServer;
use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("PLUMBLINE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("plumbline.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("plumbline {} starting", VERSION);
    info!(
        "Idle timeout: {}s, poll interval: {}ms, abort on stall: {}",
        config.status.idle_timeout_secs,
        config.monitor.poll_interval_ms,
        config.monitor.abort_on_stall
    );

    // Create the aggregator for this run
    let status = StatusHandle::new(ProcessingStatus::from_config(&config.status));
    let state = Arc::new(AppState::new(config.clone(), status.clone()));

    // Create the proxy server
    let port = config.server.resolved_port(std::process::id());
    let server = Arc::new(
        HttpProxyServer::new(config.server.host, port).with_routes(create_router(state)),
    );
    server.open().await.context("Failed to open proxy server")?;
    register_status_functions(server.as_ref(), status.clone())
        .await
        .context("Failed to register status functions")?;

    info!("Starting proxy server on {}:{}", config.server.host, port);
    let mut server_task = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.start_proxy().await }
    });

    // Forward Ctrl+C / SIGTERM to the monitor
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = signal_tx.send(());
    });

    let monitor = PipelineMonitor::new(status, config.monitor.clone());

    let outcome = tokio::select! {
        outcome = monitor.run(shutdown_rx) => outcome,
        result = &mut server_task => {
            let _ = shutdown_tx.send(());
            return match result {
                Ok(Ok(())) => Err(anyhow!("Proxy server stopped unexpectedly")),
                Ok(Err(e)) => Err(e).context("Proxy server failed"),
                Err(e) => Err(e).context("Proxy server task panicked"),
            };
        }
    };

    // Stop serving before reporting the outcome
    info!("Stopping proxy server...");
    server.stop();
    match server_task.await {
        Ok(Ok(())) => info!("Proxy server stopped"),
        Ok(Err(e)) => error!("Proxy server error during shutdown: {}", e),
        Err(e) => error!("Proxy server task failed: {}", e),
    }

    match outcome {
        MonitorOutcome::Completed(report) => {
            info!(
                "Processing completed: {} events from {} work items",
                report.storage_writer_events, report.number_of_extracted_work_items
            );
            Ok(())
        }
        MonitorOutcome::Shutdown => {
            info!("Coordinator shutting down...");
            Ok(())
        }
        MonitorOutcome::Stalled(report) => Err(anyhow!(
            "Pipeline stalled in phase {} ({} events extracted, {} stored)",
            report.phase,
            report.number_of_extracted_events,
            report.storage_writer_events
        )),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
}
