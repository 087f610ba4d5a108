//! Manual Sync - Main entry point
//!
//! Runs a single pass with `--once`, otherwise synchronizes on a cron schedule
//! until SIGINT or SIGTERM.

use anyhow::Result;
use clap::Parser;
use manual_sync::config::{Config, Target};
use manual_sync::download::HttpDownloader;
use manual_sync::engine::{EngineOptions, SyncEngine};
use manual_sync::manifest::ManualsApi;
use manual_sync::remote::{InMemoryStore, LocalDirStore, RemoteStore};
use manual_sync::scheduler::SyncScheduler;
use manual_sync::service::SyncService;
use manual_sync::sharepoint::SharePointClient;
use manual_sync::utils;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run one synchronization pass and exit
    #[arg(long)]
    once: bool,

    /// Maximum number of files per pass, 0 for unlimited (overrides config)
    #[arg(short, long)]
    max_files: Option<usize>,

    /// Destination store: sharepoint, local or memory (overrides config)
    #[arg(short, long, value_enum)]
    target: Option<Target>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(max_files) = args.max_files {
        config.sync.max_files = max_files;
    }
    if let Some(target) = args.target {
        config.sync.target = target;
    }

    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    config.validate()?;

    tracing::info!(
        store = ?config.sync.target,
        root = %config.sync.root_folder,
        "Starting manual-sync v{}",
        env!("CARGO_PKG_VERSION")
    );

    let store = build_store(&config)?;
    let source = Arc::new(ManualsApi::new(&config.manuals)?);
    let fetcher = Arc::new(HttpDownloader::new(config.sync.download_timeout())?);
    let options = EngineOptions {
        root_folder: config.sync.root_folder.clone(),
        source_label: config.sync.source_label.clone(),
        retry: config.sync.retry.to_retry_config(),
    };

    let cancel = CancellationToken::new();
    let engine = SyncEngine::with_cancel(store, fetcher, options, cancel.clone());
    let service = Arc::new(SyncService::new(source, engine));
    let max_files = config.sync.max_files();

    if args.once {
        let summary = service.run(max_files).await?;
        if summary.failed > 0 {
            tracing::warn!(failed = summary.failed, "Some files were not synchronized");
        }
        return Ok(());
    }

    let scheduler = Arc::new(SyncScheduler::new(service, max_files).await?);
    scheduler.schedule(&config.sync.schedule).await?;
    scheduler.start().await?;

    let startup_run = if config.sync.run_on_startup {
        let scheduler = scheduler.clone();
        Some(tokio::spawn(async move { scheduler.run_now().await }))
    } else {
        None
    };

    shutdown_signal().await;

    tracing::info!("Shutting down...");
    cancel.cancel();

    if let Some(handle) = startup_run {
        if let Err(e) = handle.await {
            tracing::error!("Startup synchronization task panicked: {}", e);
        }
    }

    // Waits for a scheduled pass to finish its current file
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!("Scheduler shutdown error: {}", e);
    }
    tracing::info!("Stopped");

    Ok(())
}

fn build_store(config: &Config) -> Result<Arc<dyn RemoteStore>> {
    let hash_field = config.sharepoint.hash_field.clone();
    let store: Arc<dyn RemoteStore> = match config.sync.target {
        Target::SharePoint => Arc::new(SharePointClient::new(&config.sharepoint)?),
        Target::Local => {
            let root = config
                .sync
                .local_root
                .clone()
                .ok_or_else(|| anyhow::anyhow!("sync.local_root is required for the local target"))?;
            Arc::new(LocalDirStore::new(root, hash_field))
        }
        Target::Memory => {
            tracing::warn!("Using in-memory store, nothing is persisted");
            Arc::new(InMemoryStore::new())
        }
    };
    Ok(store)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl+c: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
