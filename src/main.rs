use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use restock_watcher::config::LoggingConfig;
use restock_watcher::plugins::PluginManager;
use restock_watcher::{AppConfig, Pipeline, RunCoordinator};

#[derive(Debug, Parser)]
#[command(name = "restock-watcher", version, about = "Watches retail catalogs for new listings, price drops and restocks")]
struct Cli {
    /// Directory holding default.toml, <run-mode>.toml and local.toml
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Overrides RUN_MODE
    #[arg(long)]
    run_mode: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let run_mode = cli
        .run_mode
        .or_else(|| std::env::var("RUN_MODE").ok())
        .unwrap_or_else(|| "development".to_string());

    let config = AppConfig::load(&cli.config_dir, &run_mode).context("Failed to load configuration")?;
    let _log_guard = init_tracing(&config.logging);

    info!(run_mode = %run_mode, sources = config.sources.len(), "Starting restock watcher");

    if config.metrics.enabled {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.metrics.port))
            .install()
            .context("Failed to start metrics exporter")?;
        info!(port = config.metrics.port, "Metrics exporter listening");
    }

    let plugins = PluginManager::from_config(&config).await?;
    let collaborators = plugins.build().await?;

    let pipeline = Pipeline::new(collaborators, &config);
    let coordinator = RunCoordinator::new(pipeline, config.scheduler.clone());
    coordinator.start().await?;

    wait_for_shutdown().await;
    info!("Shutdown signal received");

    let summary = coordinator.shutdown(config.scheduler.shutdown_grace()).await;
    if summary.drained {
        info!("All running tasks finished");
    } else {
        warn!(abandoned = ?summary.abandoned, "Exited with tasks still running");
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("restock_watcher=info"));

    let (file_layer, guard) = match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &logging.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .init();

    guard
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
