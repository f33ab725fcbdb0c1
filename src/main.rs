//! `refrain`: keeps lyric sidecar files next to the audio files of a music
//! library.
//!
//! Configuration comes from the environment (see
//! [`PipelineConfig::from_env`] and [`LoggingConfig::from_env`]). The daemon
//! runs until SIGINT or SIGTERM.

use anyhow::{Context, Result};
use core_runtime::config::PipelineConfig;
use core_runtime::logging::{init_logging, LoggingConfig};
use core_service::LyricsSyncService;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let logging = LoggingConfig::from_env().context("invalid logging configuration")?;
    init_logging(logging).context("failed to initialize logging")?;

    let config = PipelineConfig::from_env().context("invalid pipeline configuration")?;
    info!(
        roots = ?config.library_paths,
        provider = %config.lrclib_base_url,
        workers = config.worker_concurrency,
        "Starting refrain"
    );

    let service = LyricsSyncService::builder(config)
        .build()
        .await
        .context("failed to build lyrics sync service")?;

    service
        .start()
        .await
        .context("failed to start lyrics sync service")?;

    shutdown_signal().await?;
    info!("Shutdown signal received");

    service
        .shutdown()
        .await
        .context("lyrics sync service did not shut down cleanly")?;
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("failed to listen for SIGINT"),
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")
}
