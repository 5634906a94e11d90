//! # firm-sync
//!
//! Runs the provider reconciliation service until Ctrl+C or SIGTERM.
//!
//! ```bash
//! FIRM_SYNC_DATABASE_URL=sqlite://sync.db \
//! FIRM_SYNC_PROVIDER_BASE_URL=https://pda.example.com \
//! FIRM_SYNC_PROVIDER_API_KEY=... \
//! cargo run --bin firm-sync
//! ```

use anyhow::Context;
use core_runtime::logging::init_logging;
use core_service::{SyncService, SyncSettings};
use std::future::Future;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = SyncSettings::from_env().context("Failed to load settings")?;
    init_logging(settings.logging_config()).context("Failed to initialize logging")?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting firm-sync");

    // Installed before any work starts so an early signal is not lost.
    let shutdown = shutdown_signal()?;

    let service = SyncService::bootstrap(settings)
        .await
        .context("Failed to bootstrap sync service")?;

    match service.start().await.context("Failed to start scheduler")? {
        Some(task_id) => info!(task_id = %task_id.0, "Scheduler running"),
        None => info!("Scheduler disabled; waiting for shutdown"),
    }

    shutdown.await;
    info!("Shutdown signal received");

    if let Err(e) = service.shutdown().await {
        error!(error = %e, "Failed to stop cleanly");
    }

    info!("firm-sync stopped");
    Ok(())
}

#[cfg(unix)]
fn shutdown_signal() -> anyhow::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt =
        signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => info!("Received SIGINT"),
            _ = terminate.recv() => info!("Received SIGTERM"),
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> anyhow::Result<impl Future<Output = ()>> {
    let ctrl_c = tokio::signal::ctrl_c();
    Ok(async move {
        if let Err(e) = ctrl_c.await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    })
}
