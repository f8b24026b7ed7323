//! Tally accumulator daemon.
//!
//! Runs a block coordinator over RocksDB storage. Blocks are sealed on a
//! fixed timer; directory roots are logged as they are published. With
//! `--stdin-entries`, entry hashes are read from standard input as
//! whitespace-separated `<chain_hex> <entry_hex>` lines, a convenience
//! ingress for piping feeds in until a transport is wired up.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tally_acc::{AccConfig, AccHandles, Accumulator, RocksStore};
use tally_core::constants::DEFAULT_BLOCK_INTERVAL_SECS;
use tally_core::types::{EntryHash, Hash256};

/// Tally accumulator daemon — orders entry streams into directory blocks.
#[derive(Parser, Debug)]
#[command(
    name = "tally-accd",
    version,
    about = "Accumulator daemon with RocksDB storage and timed block sealing"
)]
struct Args {
    /// Data directory for node storage
    #[arg(long, default_value = None)]
    data_dir: Option<PathBuf>,

    /// Accumulator identity as 64 hex characters
    #[arg(long, default_value_t = Hash256::ZERO)]
    chain_id: Hash256,

    /// Seconds between automatic end-of-block signals
    #[arg(long, default_value_t = DEFAULT_BLOCK_INTERVAL_SECS)]
    block_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Read entries from stdin as "<chain_hex> <entry_hex>" lines
    #[arg(long)]
    stdin_entries: bool,
}

impl Args {
    /// Convert CLI args into an AccConfig.
    fn to_config(&self) -> AccConfig {
        let mut config = AccConfig::default();
        if let Some(ref data_dir) = self.data_dir {
            config.data_dir = data_dir.clone();
        }
        config.block_interval_secs = self.block_interval_secs;
        config.log_level = self.log_level.clone();
        config
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = args.to_config();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store = match RocksStore::open(config.db_path()) {
        Ok(store) => store,
        Err(e) => {
            error!("failed to open store at {:?}: {e}", config.db_path());
            process::exit(1);
        }
    };

    let (mut acc, handles) = match Accumulator::new(store, args.chain_id, &config) {
        Ok(pair) => pair,
        Err(e) => {
            error!("failed to initialize accumulator: {e}");
            process::exit(1);
        }
    };
    let AccHandles {
        entries,
        control,
        roots: mut root_rx,
    } = handles;

    let coordinator = tokio::spawn(async move { acc.run().await });

    let root_logger = tokio::spawn(async move {
        while let Some(root) = root_rx.recv().await {
            info!(%root, "directory root published");
        }
    });

    if args.stdin_entries {
        tokio::spawn(feed_stdin(entries));
    } else {
        drop(entries);
    }

    // Seal blocks on a fixed cadence until shutdown is requested.
    let mut ticker = tokio::time::interval(Duration::from_secs(config.block_interval_secs));
    ticker.tick().await; // the first tick completes immediately
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if control.send(true).await.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }
    drop(control);

    match coordinator.await {
        Ok(Ok(())) => info!("accumulator stopped cleanly"),
        Ok(Err(e)) => {
            error!("accumulator failed: {e}");
            process::exit(1);
        }
        Err(e) => {
            error!("accumulator task failed: {e}");
            process::exit(1);
        }
    }
    let _ = root_logger.await;
}

/// Pump stdin lines into the entry feed until EOF or feed closure.
async fn feed_stdin(entries: mpsc::Sender<EntryHash>) {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match parse_entry_line(line) {
                    Ok(entry) => {
                        if entries.send(entry).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("skipping malformed entry line: {e}"),
                }
            }
            Ok(None) => {
                info!("entry input reached EOF");
                break;
            }
            Err(e) => {
                warn!("stdin read failed: {e}");
                break;
            }
        }
    }
}

/// Parse one `<chain_hex> <entry_hex>` line.
fn parse_entry_line(line: &str) -> anyhow::Result<EntryHash> {
    let mut parts = line.split_whitespace();
    let chain_id = parts
        .next()
        .context("missing chain id")?
        .parse::<Hash256>()
        .context("invalid chain id")?;
    let entry_hash = parts
        .next()
        .context("missing entry hash")?
        .parse::<Hash256>()
        .context("invalid entry hash")?;
    if parts.next().is_some() {
        bail!("trailing tokens after entry hash");
    }
    Ok(EntryHash {
        chain_id,
        entry_hash,
    })
}
