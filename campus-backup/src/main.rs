//! Campus Backup - service entry point
//!
//! Arms the daily snapshot job and keeps it running until SIGINT/SIGTERM.

use anyhow::Result;
use campus_backup::{utils, BackupRunner, BackupScheduler, Config, RetentionPolicy};
use clap::Parser;
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

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Take one snapshot immediately in addition to the schedule
    #[arg(long)]
    run_now: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;

    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!(
        "Starting campus-backup v{} (dir: {})",
        env!("CARGO_PKG_VERSION"),
        config.backup.dir.display()
    );

    let policy = RetentionPolicy {
        max_age: config.retention.max_age(),
    };
    let runner = Arc::new(BackupRunner::new(config.backup.clone(), policy));
    let scheduler = BackupScheduler::new(runner, &config.schedule.cron).await?;
    scheduler.start().await?;

    let cancel = CancellationToken::new();

    let on_demand = args.run_now.then(|| {
        let runner = scheduler.runner();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            // Dropping the attempt kills pg_dump and removes its partial output.
            tokio::select! {
                _ = cancel.cancelled() => tracing::warn!("On-demand backup abandoned"),
                _ = runner.run() => {}
            }
        })
    });

    shutdown_signal(cancel.clone()).await;

    if let Some(handle) = on_demand {
        if let Err(e) = handle.await {
            tracing::error!("On-demand backup task failed: {}", e);
        }
    }

    tracing::info!("Shutting down...");
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!("Scheduler shutdown error: {}", e);
    }
    tracing::info!("Service stopped");

    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
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

    cancel.cancel();
}
