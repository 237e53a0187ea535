//! SegmentKV Server Binary
//!
//! Opens the engine, replays any orphaned WALs and serves the TCP protocol.
//! Unflushed writes survive a kill through their WAL.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use segmentkv::compaction::CompactionWorker;
use segmentkv::network::Server;
use segmentkv::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// SegmentKV Server
#[derive(Parser, Debug)]
#[command(name = "segmentkv-server")]
#[command(about = "Log-structured key-value store")]
#[command(version)]
struct Args {
    /// Data directory; storage and temp directories default to subdirectories of it
    #[arg(short, long, default_value = "./segmentkv_data")]
    data_dir: PathBuf,

    /// Segment and index directory (overrides <data_dir>/storage)
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// WAL directory (overrides <data_dir>/tmp)
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "256")]
    max_connections: usize,

    /// Segment size bound in bytes
    #[arg(short = 's', long, default_value = "2048")]
    max_segment_size: u64,

    /// Segments smaller than this are compaction candidates
    #[arg(long, default_value = "2048")]
    compaction_threshold: u64,

    /// Background compaction period in ms (0 disables it)
    #[arg(short = 'c', long, default_value = "0")]
    compaction_interval_ms: u64,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,segmentkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("SegmentKV Server v{}", segmentkv::VERSION);

    let mut builder = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .max_segment_size(args.max_segment_size)
        .compaction_threshold(args.compaction_threshold)
        .compaction_interval_ms(args.compaction_interval_ms);
    if let Some(dir) = &args.storage_dir {
        builder = builder.storage_dir(dir);
    }
    if let Some(dir) = &args.temp_dir {
        builder = builder.temp_dir(dir);
    }
    let config = builder.build();

    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!(error = %e, "failed to open engine");
            std::process::exit(1);
        }
    };

    let recovery = engine.recovery_result();
    tracing::info!(
        files = recovery.files_replayed,
        records = recovery.records_recovered,
        corrupt = recovery.records_corrupted,
        "recovery complete"
    );

    let _compactor = if config.compaction_interval_ms > 0 {
        let interval = Duration::from_millis(config.compaction_interval_ms);
        match CompactionWorker::spawn(&engine, interval) {
            Ok(worker) => Some(worker),
            Err(e) => {
                tracing::error!(error = %e, "failed to start compaction worker");
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    let server = match Server::bind(config, Arc::clone(&engine)) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }

    tracing::info!("server stopped");
}
