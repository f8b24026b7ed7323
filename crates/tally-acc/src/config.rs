//! Coordinator configuration.
//!
//! Provides [`AccConfig`] with defaults for the data directory, channel
//! capacities, and the daemon's block interval. The configuration can be
//! customized programmatically or from CLI flags (tally-accd).

use std::path::PathBuf;

use tally_core::constants::{DEFAULT_BLOCK_INTERVAL_SECS, ENTRY_FEED_CAPACITY};

/// Configuration for an accumulator instance.
#[derive(Debug, Clone)]
pub struct AccConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// Bounded capacity of the entry feed; producers block when full.
    pub entry_feed_capacity: usize,
    /// Seconds between automatic end-of-block signals in the daemon.
    pub block_interval_secs: u64,
    /// Log level filter string (e.g. "info", "debug", "tally_acc=trace").
    pub log_level: String,
}

impl Default for AccConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tally");

        Self {
            data_dir,
            entry_feed_capacity: ENTRY_FEED_CAPACITY,
            block_interval_secs: DEFAULT_BLOCK_INTERVAL_SECS,
            log_level: "info".to_string(),
        }
    }
}

impl AccConfig {
    /// Path to the RocksDB node store directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("accdata")
    }
}
