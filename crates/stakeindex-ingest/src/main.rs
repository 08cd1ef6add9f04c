//! Staking indexer replay tool.
//!
//! Replays an exported staking contract event log (JSONL) into the entity
//! store and reports what was applied, dropped and retried.
//!
//! # Usage
//!
//! ```bash
//! # Replay a directory of JSONL files into RocksDB
//! stakeindex-ingest --input ./events --db-path ./data/index
//!
//! # Dry run in memory, dump the resulting state and verify invariants
//! stakeindex-ingest --input ./events --in-memory --dump state.json --check-invariants
//! ```
//!
//! Re-running against the same database resumes: events already committed
//! are recognized and skipped.
//!
//! # Graceful Shutdown
//!
//! Ctrl+C stops the replay between events. Every committed event is complete,
//! so the next run picks up where this one stopped.

use anyhow::{Context, Result};
use clap::Parser;
use stakeindex_core::Keyspace;
use stakeindex_core::metrics::{init_metrics, start_metrics_server};
use stakeindex_ingest::{
    EntityStore, Indexer, IndexerConfig, JsonlConfig, JsonlSource, MemoryStore, ReplayDriver,
    RocksStore, check_invariants,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

/// Replay staking contract events into derived aggregates.
#[derive(Parser, Debug)]
#[command(name = "stakeindex-ingest")]
#[command(about = "Replay staking contract events into the entity store")]
#[command(version)]
struct Args {
    /// Input JSONL file or directory of JSONL files
    #[arg(short, long)]
    input: PathBuf,

    /// RocksDB path for the entity store
    #[arg(long, default_value = "./data/index")]
    db_path: PathBuf,

    /// Keep all state in memory instead of RocksDB
    #[arg(long)]
    in_memory: bool,

    /// Fsync every commit
    #[arg(long)]
    sync_writes: bool,

    /// Skip undecodable lines instead of failing
    #[arg(long)]
    continue_on_error: bool,

    /// Limit number of input files (for testing)
    #[arg(long)]
    limit: Option<usize>,

    /// Write a JSON dump of the final state to this path
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Verify cross-aggregate invariants after the replay
    #[arg(long)]
    check_invariants: bool,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, default_value = "0")]
    metrics_port: u16,

    /// Path to .env file (optional)
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if std::path::Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)?;
        eprintln!("Loaded environment from {}", args.dotenv);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,stakeindex_ingest=debug")),
        )
        .init();

    tracing::info!("Staking indexer replay starting...");

    let config = IndexerConfig::from_env()?;

    if args.metrics_port > 0 {
        let handle = init_metrics();
        start_metrics_server(args.metrics_port, handle).await?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received, stopping after the current event...");
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    tracing::info!("Configuration:");
    tracing::info!("  Input: {}", args.input.display());
    if args.in_memory {
        tracing::info!("  Store: in-memory");
    } else {
        tracing::info!("  Store: {}", args.db_path.display());
    }
    tracing::info!("  Require initialized: {}", config.require_initialized);
    tracing::info!("  Max retries: {}", config.max_retries);

    if args.in_memory {
        let indexer = Indexer::new(MemoryStore::new(), config);
        replay(&indexer, &args, running)
    } else {
        let store = RocksStore::open(&args.db_path)
            .with_context(|| format!("Failed to open store at {}", args.db_path.display()))?
            .with_sync_writes(args.sync_writes);
        tracing::info!(
            "  Seen events: ~{}",
            store.approximate_count(Keyspace::SeenEvents)?
        );

        let indexer = Indexer::new(store, config);
        let result = replay(&indexer, &args, running);
        indexer.store().flush().context("Failed to flush store")?;
        result
    }
}

fn replay<S: EntityStore>(
    indexer: &Indexer<S>,
    args: &Args,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let cursor = indexer.cursor()?;
    if let Some(last) = cursor.last_position {
        tracing::info!(
            "Resuming after {} ({} applied, {} dropped so far)",
            last,
            cursor.events_applied,
            cursor.events_dropped
        );
    }

    let mut source = JsonlSource::new(JsonlConfig {
        input: args.input.clone(),
        continue_on_error: args.continue_on_error,
        limit: args.limit,
        ..Default::default()
    });

    let (stats, source_stats) = ReplayDriver::new(indexer)
        .with_shutdown_flag(running)
        .run_source(&mut source)
        .context("Replay halted")?;

    tracing::info!("═══════════════════════════════════════════════════════════");
    tracing::info!("Replay complete");
    tracing::info!("  Files processed: {}", source_stats.files_processed);
    tracing::info!("  Bytes read:      {}", source_stats.bytes_read);
    tracing::info!("  Invalid lines:   {}", source_stats.invalid_events);
    tracing::info!("  Events seen:     {}", stats.events_seen);
    tracing::info!("  Applied:         {}", stats.events_applied);
    tracing::info!("  Dropped:         {}", stats.events_dropped);
    for (reason, count) in &stats.drop_reasons {
        tracing::info!("    {}: {}", reason, count);
    }
    tracing::info!("  Retries:         {}", stats.retries);
    if stats.interrupted {
        tracing::info!("  Interrupted by shutdown signal");
    }
    tracing::info!("═══════════════════════════════════════════════════════════");

    if args.check_invariants {
        let violations = check_invariants(indexer.store())?;
        if !violations.is_empty() {
            for violation in &violations {
                tracing::error!("Invariant violated: {}", violation);
            }
            anyhow::bail!("{} invariant violations", violations.len());
        }
        tracing::info!("All invariants hold");
    }

    if let Some(path) = &args.dump {
        let json = indexer.snapshot()?.to_json_pretty()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write dump to {}", path.display()))?;
        tracing::info!("State written to {}", path.display());
    }

    Ok(())
}
