//! MemTable implementation
//!
//! Vec of entries plus a key → slot index, backed by one WAL file.

use std::collections::HashMap;
use std::path::Path;

use crate::config::WalSyncStrategy;
use crate::entry::{parse_record, Entry};
use crate::error::{KvError, Result};
use crate::segment::{SegmentMeta, SegmentWriter};
use crate::wal::{ReplaySink, Wal};

/// In-memory table for one generation of writes
///
/// Not synchronized on its own; the engine serializes access.
pub struct MemTable {
    /// Log of this generation; `None` once persisted
    wal: Option<Wal>,
    /// Unique-by-key entries, in insertion order until `persist` sorts them
    entries: Vec<Entry>,
    /// key → position in `entries`
    index: HashMap<String, usize>,
    /// Whether `entries` is currently sorted by key
    sorted: bool,
    /// Sum of in-memory value lengths
    size: u64,
}

impl MemTable {
    /// Create an empty generation with a fresh WAL in `temp_dir`
    pub fn new(temp_dir: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let wal = Wal::open(temp_dir, sync_strategy)?;
        Ok(Self {
            wal: Some(wal),
            entries: Vec::new(),
            index: HashMap::new(),
            sorted: true,
            size: 0,
        })
    }

    /// Insert a `"<key> <value>"` record
    ///
    /// The record reaches the WAL before the in-memory add; if the append
    /// fails nothing is visible and the error is returned. A malformed record
    /// is rejected without touching either.
    pub fn insert(&mut self, record: &str) -> Result<()> {
        let (key, value) = parse_record(record)?;
        let wal = self.wal.as_mut().ok_or(KvError::GenerationSealed)?;

        wal.append(record)?;

        let entry = Entry::new(key, bytes::Bytes::copy_from_slice(value.as_bytes()));
        self.add(entry);
        Ok(())
    }

    fn add(&mut self, entry: Entry) {
        self.size += entry.length;

        let existing = self.index.get(&entry.key).copied();
        match existing {
            Some(slot) => {
                let previous = std::mem::replace(&mut self.entries[slot], entry);
                self.size -= previous.length;
            }
            None => {
                if let Some(last) = self.entries.last() {
                    if last.key > entry.key {
                        self.sorted = false;
                    }
                }
                self.index.insert(entry.key.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Get an entry of the current generation
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.index.get(key).map(|&slot| &self.entries[slot])
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes of values held in memory
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether this generation has already been flushed
    pub fn is_persisted(&self) -> bool {
        self.wal.is_none()
    }

    /// Path of the WAL file, while the generation is open
    pub fn wal_path(&self) -> Option<&Path> {
        self.wal.as_ref().map(|w| w.path())
    }

    /// Entries in their current order
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Sort by key and rebuild the key index
    fn sort_entries(&mut self) {
        if self.sorted {
            return;
        }

        self.entries.sort_by(|a, b| a.key.cmp(&b.key));
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(slot, e)| (e.key.clone(), slot))
            .collect();
        self.sorted = true;
    }

    /// Flush this generation into segment files of generation `generation`
    ///
    /// On success every entry records its segment and offset and drops its
    /// value, the WAL file is deleted and the generation is closed. If any
    /// segment write fails the error is returned and the WAL stays on disk,
    /// so the records can still be recovered.
    pub fn persist(&mut self, writer: &SegmentWriter, generation: u64) -> Result<Vec<SegmentMeta>> {
        if self.wal.is_none() {
            return Err(KvError::GenerationSealed);
        }

        self.sort_entries();

        let metas = writer.write_segments(&self.entries, generation)?;

        for meta in &metas {
            for located in &meta.index.entries {
                if let Some(&slot) = self.index.get(&located.key) {
                    self.entries[slot].mark_flushed(&located.segment, located.offset);
                }
            }
        }
        self.size = 0;

        if let Some(wal) = self.wal.take() {
            // the segments already hold the data, a leftover WAL only costs space
            if let Err(e) = wal.remove() {
                tracing::error!(error = %e, "data is sealed but the WAL could not be deleted");
            }
        }

        tracing::info!(
            generation,
            entries = self.entries.len(),
            segments = metas.len(),
            "memtable persisted"
        );

        Ok(metas)
    }

    /// Drop an unused generation, deleting its WAL file
    ///
    /// Only meant for a generation that never received a write.
    pub fn discard(mut self) -> Result<()> {
        match self.wal.take() {
            Some(wal) if self.entries.is_empty() => wal.remove(),
            Some(wal) => {
                tracing::warn!(path = %wal.path().display(), "keeping WAL of non-empty memtable");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Force the WAL to disk
    pub fn sync(&mut self) -> Result<()> {
        match self.wal.as_mut() {
            Some(wal) => wal.sync(),
            None => Ok(()),
        }
    }

    /// Records of the WAL as seen on disk
    pub fn seal_wal(&mut self) -> Result<Vec<String>> {
        self.wal.as_mut().ok_or(KvError::GenerationSealed)?.seal()
    }
}

impl ReplaySink for MemTable {
    fn replay(&mut self, record: &str) -> Result<()> {
        self.insert(record)
    }

    fn sync(&mut self) -> Result<()> {
        MemTable::sync(self)
    }
}
