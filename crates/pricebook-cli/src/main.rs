//! Pricebook CLI - main entry point

mod progress;

use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::error;

use pricebook_common::logging::{init_logging, LogConfig, LogLevel};
use pricebook_engine::{MemoryStore, SyncConfig, SyncStats, Synchronizer};

#[derive(Parser)]
#[command(name = "pricebook", version, about = "Catalog price synchronization engine")]
struct Cli {
    /// Verbose console logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full price synchronization
    Sync {
        /// Recompute descriptive fields even when already merged
        #[arg(long)]
        force: bool,
    },
    /// Show the effective configuration and catalog seed summary
    Status,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Environment variables take precedence over the verbose flag
    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if cli.verbose && std::env::var("LOG_LEVEL").is_err() {
        log_config.level = LogLevel::Debug;
    }
    let _ = init_logging(&log_config);

    let result = match cli.command {
        Commands::Sync { force } => sync(force).await,
        Commands::Status => status(),
    };

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn sync(force: bool) -> anyhow::Result<()> {
    let config = SyncConfig::from_env();
    let store = Arc::new(MemoryStore::new());
    let synchronizer = Arc::new(Synchronizer::new(config, store)?);

    let pb = progress::create_sync_progress();
    let runner = {
        let synchronizer = Arc::clone(&synchronizer);
        tokio::spawn(async move { synchronizer.synchronize(force).await })
    };

    while !runner.is_finished() {
        progress::render(&pb, &synchronizer.progress());
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    let stats = runner.await??;
    pb.finish_and_clear();
    print_summary(&stats);
    Ok(())
}

fn print_summary(stats: &SyncStats) {
    println!("Synchronization complete");
    println!("  regions:        {}", stats.regions);
    println!("  types:          {}", stats.resource_types);
    println!("  terms:          {}", stats.terms);
    println!("  prices:         {}", stats.prices);
    println!("  storage types:  {}", stats.storage_types);
    println!("  storage prices: {}", stats.storage_prices);
    println!("  purged:         {}", stats.purged);
    if stats.orphaned_splits > 0 {
        println!("  orphaned split rows: {}", stats.orphaned_splits);
    }
    if let (Some(start), Some(end)) = (stats.started_at, stats.finished_at) {
        println!("  duration:       {}s", (end - start).num_seconds());
    }
}

fn status() -> anyhow::Result<()> {
    let config = SyncConfig::from_env();
    println!("Pricebook configuration");
    println!("  base URL:        {}", config.base_url);
    println!("  offer index:     {}", config.index_path);
    println!("  spot feed:       {}", config.spot_path);
    println!("  block storage:   {}", config.block_storage_path);
    println!("  enabled regions: {}", config.enabled_regions);
    println!("  enabled OS:      {}", config.enabled_os);
    println!("  enabled types:   {}", config.enabled_types);
    config.compile_filters()?;
    println!("  filters:         ok");
    Ok(())
}
