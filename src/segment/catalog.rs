//! Segment Catalog
//!
//! Tracks every sealed segment in the storage directory and serves reads.
//!
//! ## Responsibilities
//! - Discover existing segment+index pairs on startup
//! - Quarantine pairs a crash left unreadable
//! - Search segments newest → oldest for reads
//! - Hand out monotonic generation numbers

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::Result;

use super::{IndexEntry, SegmentId, SegmentMeta, SegmentReader};

/// Suffix appended to files moved out of the way at startup
const QUARANTINE_SUFFIX: &str = ".corrupt";

/// The set of sealed segments
///
/// ## Concurrency:
/// - `segments`: Protected by RwLock (many concurrent readers, exclusive writer)
/// - `next_generation`: Atomic counter (lock-free)
pub struct SegmentCatalog {
    /// Directory where segments are stored
    storage_dir: PathBuf,

    /// Open segment readers, ordered newest → oldest
    segments: RwLock<Vec<SegmentReader>>,

    /// Next generation to allocate
    next_generation: AtomicU64,
}

impl SegmentCatalog {
    /// Open the catalog for `path`
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Discover segment files and load their indexes
    /// 3. Quarantine segments without a readable, matching index
    /// 4. Remove index files whose segment is gone
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut segments = Vec::new();
        let mut max_generation = 0u64;

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();
            if !file_path.is_file() {
                continue;
            }

            let name = match file_path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            if let Some(id) = SegmentId::from_segment_file_name(&name) {
                max_generation = max_generation.max(id.generation);

                match SegmentReader::open(&file_path) {
                    Ok(reader) => segments.push(reader),
                    Err(e) => {
                        tracing::error!(
                            segment = %file_path.display(),
                            error = %e,
                            "segment has no usable index, quarantining"
                        );
                        quarantine(&file_path);
                        quarantine(&path.join(id.index_file_name()));
                    }
                }
            } else if let Some(id) = SegmentId::from_index_file_name(&name) {
                max_generation = max_generation.max(id.generation);

                if !path.join(id.segment_file_name()).exists() {
                    tracing::warn!(index = %file_path.display(), "removing index without segment");
                    if let Err(e) = fs::remove_file(&file_path) {
                        tracing::error!(index = %file_path.display(), error = %e, "could not remove stray index");
                    }
                }
            }
        }

        // Newest first
        segments.sort_by(|a, b| b.id().cmp(&a.id()));

        tracing::info!(
            dir = %path.display(),
            segments = segments.len(),
            "segment catalog loaded"
        );

        Ok(Self {
            storage_dir: path.to_path_buf(),
            segments: RwLock::new(segments),
            next_generation: AtomicU64::new(max_generation + 1),
        })
    }

    /// Get a value by key (searches all segments newest → oldest)
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let segments = self.segments.read();

        for reader in segments.iter() {
            if let Some(value) = reader.get(key)? {
                return Ok(Some(value));
            }
        }

        Ok(None)
    }

    /// Newest index entry for `key`
    pub fn locate(&self, key: &str) -> Option<IndexEntry> {
        let segments = self.segments.read();
        segments.iter().find_map(|reader| reader.find(key).cloned())
    }

    /// Reserve a generation for a flush or compaction run
    pub fn allocate_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::SeqCst)
    }

    /// Get the next generation (for testing/debugging)
    pub fn next_generation(&self) -> u64 {
        self.next_generation.load(Ordering::SeqCst)
    }

    /// Add freshly written pairs
    pub fn register(&self, metas: Vec<SegmentMeta>) {
        self.replace(&[], metas);
    }

    /// Atomically swap compaction inputs for their merged output
    pub fn replace(&self, inputs: &[SegmentId], outputs: Vec<SegmentMeta>) {
        let mut segments = self.segments.write();
        segments.retain(|reader| !inputs.contains(&reader.id()));
        for meta in outputs {
            segments.push(SegmentReader::from_parts(
                meta.id,
                meta.segment_path,
                meta.index_path,
                meta.index,
                meta.size,
            ));
        }
        segments.sort_by(|a, b| b.id().cmp(&a.id()));
    }

    /// Snapshot of the catalog, newest first
    pub fn readers(&self) -> Vec<SegmentReader> {
        self.segments.read().clone()
    }

    /// Ids of every segment, newest first
    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.segments.read().iter().map(|r| r.id()).collect()
    }

    /// Get the number of segments
    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    /// Get the storage directory path
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}

fn quarantine(path: &Path) {
    if !path.exists() {
        return;
    }

    let mut target = path.as_os_str().to_owned();
    target.push(QUARANTINE_SUFFIX);

    if let Err(e) = fs::rename(path, &target) {
        tracing::error!(path = %path.display(), error = %e, "could not quarantine file");
    }
}
