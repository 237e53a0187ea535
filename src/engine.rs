//! Engine Module
//!
//! The storage engine handle that owns every component.
//!
//! ## Responsibilities
//! - Sweep crash garbage and replay orphaned WALs on startup
//! - Route writes through the active MemTable (WAL first)
//! - Flush the active generation into segments and open the next one
//! - Serve reads from the MemTable, then from sealed segments
//! - Serialize compaction against flushes

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::compaction::{self, CompactionOutcome, Compactor};
use crate::config::Config;
use crate::entry::{format_record, Entry};
use crate::error::{KvError, Result};
use crate::memtable::MemTable;
use crate::protocol::Command;
use crate::segment::{read_range, IndexEntry, SegmentCatalog, SegmentId, SegmentWriter};
use crate::wal::{clean_empty_files, RecoveryResult, WalRecovery};

/// The main storage engine
///
/// ## Concurrency Model
///
/// - **MemTable** (`insert`/`persist` exclusive, `get` shared): `RwLock`.
///   A flush holds the write side for its whole duration, so no insert can
///   land in a generation that is being sealed.
///
/// - **Storage directory** (flush vs compaction): `storage_lock`.
///   Acquire order: storage_lock → memtable.
///
/// - **Catalog**: internal `RwLock`, swapped atomically after a flush or merge.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Active generation
    memtable: RwLock<MemTable>,

    /// Sealed segments
    catalog: SegmentCatalog,

    /// Writes segments for flushes
    writer: SegmentWriter,

    /// Merges undersized segments
    compactor: Compactor,

    /// Serializes flush and compaction
    storage_lock: Mutex<()>,

    /// What startup recovery did
    recovery: RecoveryResult,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create storage and temp directories
    /// 2. Remove zero-byte files from both
    /// 3. Load sealed segments
    /// 4. Create the WAL for a new generation
    /// 5. Replay orphaned WAL files into it
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        // Step 1: Directories
        fs::create_dir_all(&config.storage_dir)?;
        fs::create_dir_all(&config.temp_dir)?;

        // Step 2: Garbage left by a crash before any byte was flushed
        let mut empty_files_removed = clean_empty_files(&config.storage_dir)?;
        if config.temp_dir != config.storage_dir {
            empty_files_removed += clean_empty_files(&config.temp_dir)?;
        }

        // Step 3: Sealed segments
        let catalog = SegmentCatalog::open(&config.storage_dir)?;

        // Step 4: Fresh generation
        let mut memtable = MemTable::new(&config.temp_dir, config.wal_sync_strategy)?;

        // Step 5: Orphans go through insert so the new WAL captures them too
        let active_wal = memtable
            .wal_path()
            .map(Path::to_path_buf)
            .ok_or(KvError::GenerationSealed)?;
        let mut recovery = WalRecovery::new(&config.temp_dir, &active_wal).recover(&mut memtable)?;
        recovery.empty_files_removed = empty_files_removed;

        let writer = SegmentWriter::new(&config.storage_dir, config.max_segment_size);
        let compactor = Compactor::new(
            &config.storage_dir,
            config.compaction_threshold,
            config.max_segment_size,
        );

        tracing::info!(
            storage = %config.storage_dir.display(),
            temp = %config.temp_dir.display(),
            segments = catalog.segment_count(),
            recovered = recovery.records_recovered,
            "engine opened"
        );

        Ok(Self {
            config,
            memtable: RwLock::new(memtable),
            catalog,
            writer,
            compactor,
            storage_lock: Mutex::new(()),
            recovery,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with storage and temp directories under `path`
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Execute a command
    ///
    /// Routes commands to appropriate handlers
    pub fn execute(&self, command: Command) -> Result<Option<Vec<u8>>> {
        match command {
            Command::Get { key } => {
                let key = utf8(&key, "key")?;
                self.get(key)?.map(Some).ok_or(KvError::KeyNotFound)
            }
            Command::Put { key, value } => {
                self.put(utf8(&key, "key")?, utf8(&value, "value")?)?;
                Ok(None)
            }
            Command::Flush => {
                let ids = self.persist()?;
                Ok(Some(format!("{} segment(s) written", ids.len()).into_bytes()))
            }
            Command::Compact => {
                let summary = match self.compact()? {
                    CompactionOutcome::NoCandidates => "nothing to compact".to_string(),
                    CompactionOutcome::Compacted { inputs, outputs, .. } => {
                        format!("{} segment(s) merged into {}", inputs.len(), outputs.len())
                    }
                };
                Ok(Some(summary.into_bytes()))
            }
            Command::Ping => Ok(Some(b"PONG".to_vec())),
        }
    }

    /// Insert a raw `"<key> <value>"` record
    ///
    /// Returns only after the record is in the WAL; an error means the write
    /// must not be acknowledged.
    pub fn insert(&self, record: &str) -> Result<()> {
        self.memtable.write().insert(record)
    }

    /// Insert a key-value pair
    ///
    /// Both must be non-empty; the key may not contain spaces and neither may
    /// contain newlines.
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        let record = format_record(key, value)?;
        self.insert(&record)
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. Active MemTable
    /// 2. Sealed segments (newest to oldest)
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        {
            let memtable = self.memtable.read();
            if let Some(entry) = memtable.get(key) {
                if let Some(value) = &entry.value {
                    return Ok(Some(value.to_vec()));
                }
            }
        }

        self.catalog.get(key)
    }

    /// The active generation's entry for `key`, without touching segments
    pub fn lookup(&self, key: &str) -> Option<Entry> {
        self.memtable.read().get(key).cloned()
    }

    /// Newest sealed location of `key`
    pub fn locate(&self, key: &str) -> Option<IndexEntry> {
        self.catalog.locate(key)
    }

    /// Read the byte range an index entry points at
    pub fn read_indexed(&self, entry: &IndexEntry) -> Result<Vec<u8>> {
        let path = self.config.storage_dir.join(&entry.segment);
        read_range(&path, entry.offset, entry.length)
    }

    /// Flush the active generation to segment files
    ///
    /// Inserts are blocked for the duration. The next generation's WAL is
    /// created first; if the flush fails it is discarded and the current
    /// generation, WAL included, stays active.
    pub fn persist(&self) -> Result<Vec<SegmentId>> {
        let _storage_guard = self.storage_lock.lock();
        let mut memtable = self.memtable.write();

        if memtable.is_empty() {
            return Ok(Vec::new());
        }

        let next = MemTable::new(&self.config.temp_dir, self.config.wal_sync_strategy)?;
        let generation = self.catalog.allocate_generation();

        match memtable.persist(&self.writer, generation) {
            Ok(metas) => {
                let ids = metas.iter().map(|m| m.id).collect();
                self.catalog.register(metas);
                *memtable = next;
                Ok(ids)
            }
            Err(e) => {
                tracing::error!(generation, error = %e, "flush failed, WAL kept");
                if let Err(discard_err) = next.discard() {
                    tracing::error!(error = %discard_err, "could not discard unused WAL");
                }
                Err(e)
            }
        }
    }

    /// Merge undersized segments
    ///
    /// Candidates are segments smaller than `compaction_threshold`. They are
    /// merged only when there are at least two of them and their combined
    /// size fits in fewer segments of `max_segment_size`; otherwise the call
    /// returns `CompactionOutcome::NoCandidates` and leaves them alone.
    ///
    /// Runs under the storage lock so no flush can add a segment mid-scan.
    /// The catalog switches to the outputs before the inputs are deleted.
    pub fn compact(&self) -> Result<CompactionOutcome> {
        let _storage_guard = self.storage_lock.lock();

        let plan = self.compactor.plan()?;
        if !self.compactor.worth_merging(&plan) {
            return Ok(CompactionOutcome::NoCandidates);
        }

        let generation = self.catalog.allocate_generation();
        let (metas, dropped) = self.compactor.merge(&plan, generation)?;
        let outcome = compaction::outcome(&plan, &metas, dropped);

        self.catalog.replace(&plan.candidates, metas);
        self.compactor.remove_inputs(&plan);

        tracing::info!(?outcome, "compaction finished");
        Ok(outcome)
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data; an empty generation's WAL is deleted.
    pub fn close(self) -> Result<()> {
        self.persist()?;

        let memtable = self.memtable.into_inner();
        memtable.discard()
    }

    /// Force the active WAL to disk
    pub fn sync(&self) -> Result<()> {
        self.memtable.write().sync()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the storage directory path
    pub fn storage_dir(&self) -> &Path {
        &self.config.storage_dir
    }

    /// Get the temp (WAL) directory path
    pub fn temp_dir(&self) -> &Path {
        &self.config.temp_dir
    }

    /// Path of the active WAL file
    pub fn wal_path(&self) -> Option<PathBuf> {
        self.memtable.read().wal_path().map(Path::to_path_buf)
    }

    /// Get the memtable value bytes
    pub fn memtable_size(&self) -> u64 {
        self.memtable.read().size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.read().len()
    }

    /// Get the number of sealed segments
    pub fn segment_count(&self) -> usize {
        self.catalog.segment_count()
    }

    /// Ids of sealed segments, newest first
    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.catalog.segment_ids()
    }

    /// What startup recovery did
    pub fn recovery_result(&self) -> &RecoveryResult {
        &self.recovery
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn utf8<'a>(bytes: &'a [u8], what: &str) -> Result<&'a str> {
    std::str::from_utf8(bytes)
        .map_err(|_| KvError::InvalidInput(format!("{} is not valid UTF-8", what)))
}
