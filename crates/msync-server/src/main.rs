//! MSync Server - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use msync_common::logging::{init_logging, LogConfig};
use msync_server::{
    api::{self, AppState},
    config::Config,
    ingest::{
        common::SftpClient, remap::StagingStore, IngestConfig, RunCoordinator, SyncPipeline,
        SyncScheduler,
    },
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "msync-server")]
#[command(author, version, about = "SFTP manifest sync and remap service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler (if enabled) and the status API until stopped
    Serve,

    /// Run the pipeline once and print the run summary as JSON
    RunOnce,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("msync-server")
        .filter_directives("tower_http=debug,sqlx=warn")
        .build();

    // Environment variables take precedence
    dotenvy::dotenv().ok();
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let _log_guard = init_logging(&log_config)?;

    let config = Config::load()?;
    let ingest_config = IngestConfig::from_env()?;
    info!(
        host = %ingest_config.hostname,
        remote_dir = %ingest_config.remote_files_dir_path,
        local_root = %ingest_config.local_files_dir_path.display(),
        "Configuration loaded"
    );

    let remote = Arc::new(SftpClient::new((&ingest_config).into()));
    let store = StagingStore::connect(&config.staging.database_url).await?;
    let task_enabled = ingest_config.task_enabled;
    let period = ingest_config.fixed_rate();
    let pipeline = Arc::new(SyncPipeline::from_config(ingest_config, remote, store).await?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::RunOnce => {
            let summary = pipeline.run().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        },
        Command::Serve => {
            let coordinator = Arc::new(RunCoordinator::new(pipeline));

            let scheduler = if task_enabled {
                Some(SyncScheduler::new(coordinator.clone(), period).start())
            } else {
                info!("Scheduled sync is disabled (SFTP_TASK_ENABLED=false)");
                None
            };

            let state = AppState {
                coordinator: coordinator.clone(),
            };
            api::serve(
                &config.server,
                state,
                shutdown_signal(config.server.shutdown_timeout_secs),
            )
            .await?;

            if let Some(scheduler) = scheduler {
                scheduler.abort();
            }
            wait_for_active_run(&coordinator, config.server.shutdown_timeout_secs).await;
            info!("Server shut down gracefully");
        },
    }

    Ok(())
}

/// Let an in-flight run finish, up to the shutdown timeout
async fn wait_for_active_run(coordinator: &RunCoordinator, timeout_secs: u64) {
    if !coordinator.is_running() {
        return;
    }
    info!("Waiting up to {} seconds for the active sync run", timeout_secs);

    let wait = async {
        while coordinator.is_running() {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    };
    if tokio::time::timeout(Duration::from_secs(timeout_secs), wait).await.is_err() {
        tracing::warn!("Sync run still active at shutdown; it resumes from committed state next start");
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
}
