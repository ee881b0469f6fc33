//! PMS Ingest - maintenance evidence ingestion tool

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pms_common::logging::init_logging;
use pms_ingest::config::{self, Config};
use pms_ingest::orchestrator::{self, IngestOrchestrator, IngestStats};
use pms_ingest::store::{MaintenanceStore, MemoryStore, PgStore};
use pms_ingest::upload::validate_upload;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "pms-ingest")]
#[command(author, version, about = "Power-plant maintenance evidence ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest an evidence bundle (.zip)
    Ingest {
        /// Path to the uploaded bundle
        archive: PathBuf,

        /// Worker recorded on newly created maintenance logs
        #[arg(short, long)]
        worker: Option<String>,

        /// Run against an in-memory store; nothing is written to the database,
        /// archival storage or the upload
        #[arg(long)]
        dry_run: bool,

        /// Keep the bundle after ingestion instead of deleting it
        #[arg(long)]
        keep_upload: bool,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the classified entries of a bundle without ingesting it
    Scan {
        /// Path to the bundle
        archive: PathBuf,
    },

    /// Apply database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = config::log_config(cli.verbose)?;
    let _guard = init_logging(&log_config)?;

    let config = Config::load()?;

    match cli.command {
        Command::Ingest {
            archive,
            worker,
            dry_run,
            keep_upload,
            json,
        } => {
            let size = validate_upload(&archive, config.ingest.max_upload_size)?;
            info!(archive = %archive.display(), size, dry_run, "Starting ingestion");

            let (stats, memory) = if dry_run {
                // Archived evidence goes to a throwaway directory as well
                let archive_dir = tempfile::tempdir().context("Failed to create dry-run archive")?;
                let mut ingest_config = config.ingest.clone();
                ingest_config.archive_dir = archive_dir.path().to_path_buf();

                let memory = MemoryStore::new();
                let store: Arc<dyn MaintenanceStore> = Arc::new(memory.clone());
                let orchestrator = IngestOrchestrator::new(ingest_config, store);
                (orchestrator.ingest(&archive, worker.as_deref()).await?, Some(memory))
            } else {
                let pool = config
                    .database
                    .connect()
                    .await
                    .context("Failed to connect to database")?;
                let store: Arc<dyn MaintenanceStore> = Arc::new(PgStore::new(pool));
                let orchestrator = IngestOrchestrator::new(config.ingest.clone(), store);
                (orchestrator.ingest(&archive, worker.as_deref()).await?, None)
            };

            print_stats(&stats, json)?;
            if let Some(memory) = memory {
                print_dry_run_summary(&memory).await;
            }

            if !keep_upload && !dry_run {
                remove_upload(&archive).await;
            }
        },
        Command::Scan { archive } => {
            let descriptors = orchestrator::scan(&archive).await?;
            for descriptor in &descriptors {
                println!(
                    "{:<8} {} {:<20} {}",
                    descriptor.check_type().as_str(),
                    descriptor.date,
                    descriptor.asset_name,
                    descriptor.file_path
                );
            }
            println!("{} classified entries", descriptors.len());
        },
        Command::Migrate => {
            let pool = config
                .database
                .connect()
                .await
                .context("Failed to connect to database")?;
            PgStore::new(pool)
                .migrate()
                .await
                .context("Failed to apply migrations")?;
            info!("Migrations applied");
        },
    }

    Ok(())
}

fn print_stats(stats: &IngestStats, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }

    println!("Files:  {} total, {} processed, {} errors", stats.total_files, stats.processed, stats.errors);
    if stats.degraded > 0 {
        println!("        {} without statistics (event-log support unavailable)", stats.degraded);
    }
    println!("Assets: {} found, {} created", stats.assets_found, stats.assets_created);
    println!("Logs:   {} created", stats.logs_created);
    println!("Took:   {:.2}s", stats.duration_secs);
    Ok(())
}

async fn print_dry_run_summary(store: &MemoryStore) {
    let logs = store.logs().await;
    let details = store.details().await;
    let evidence = store.evidence().await;

    println!("Dry run, nothing written to the database:");
    for asset in store.assets().await {
        let asset_logs = logs.iter().filter(|log| log.asset_id == asset.id);
        for log in asset_logs {
            let rows = details.iter().filter(|d| d.log_id == log.id).count();
            let files = evidence.iter().filter(|e| e.log_id == log.id).count();
            println!(
                "  {} {} {:<8} {:<4} {} details, {} evidence files",
                asset.name,
                log.check_date,
                log.check_type.as_str(),
                log.result_status.as_str(),
                rows,
                files
            );
        }
    }
}

async fn remove_upload(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!(path = %path.display(), "Removed upload"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove upload"),
    }
}
