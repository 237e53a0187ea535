//! Configuration for SegmentKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{KvError, Result};

/// Main configuration for a SegmentKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding sealed segment and index files
    ///   {storage_dir}/
    ///     ├── sstable_0000000001_0000
    ///     └── index_0000000001_0000
    pub storage_dir: PathBuf,

    /// Directory holding the active WAL and any orphans left by a crash
    pub temp_dir: PathBuf,

    /// Upper bound for a single segment file (in bytes)
    pub max_segment_size: u64,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Segments smaller than this (in bytes) are merge candidates
    pub compaction_threshold: u64,

    /// Period of the background compactor in milliseconds (0 disables it)
    pub compaction_interval_ms: u64,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every append (safest, slowest)
    EveryWrite,

    /// fsync after N appends; the WAL is always synced before it is sealed
    EveryNEntries { count: usize },
}

/// Default `MAX_SEGMENT_SIZE`
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = 2048;

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("./segmentkv_data/storage"),
            temp_dir: PathBuf::from("./segmentkv_data/tmp"),
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            wal_sync_strategy: WalSyncStrategy::EveryWrite,
            compaction_threshold: DEFAULT_MAX_SEGMENT_SIZE,
            compaction_interval_ms: 0,
            listen_addr: "127.0.0.1:7070".to_string(),
            max_connections: 256,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the values an engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_size == 0 {
            return Err(KvError::Config("max_segment_size must be > 0".to_string()));
        }
        if self.compaction_threshold == 0 {
            return Err(KvError::Config(
                "compaction_threshold must be > 0".to_string(),
            ));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(KvError::Config(
                "EveryNEntries sync count must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Put both storage and temp directories under one root
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        let root = path.into();
        self.config.storage_dir = root.join("storage");
        self.config.temp_dir = root.join("tmp");
        self
    }

    /// Set the segment directory
    pub fn storage_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = path.into();
        self
    }

    /// Set the WAL directory
    pub fn temp_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = path.into();
        self
    }

    /// Set the maximum segment size (in bytes)
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.config.max_segment_size = size;
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the compaction candidate threshold (in bytes)
    pub fn compaction_threshold(mut self, size: u64) -> Self {
        self.config.compaction_threshold = size;
        self
    }

    /// Set the background compaction period (in milliseconds, 0 disables)
    pub fn compaction_interval_ms(mut self, ms: u64) -> Self {
        self.config.compaction_interval_ms = ms;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
