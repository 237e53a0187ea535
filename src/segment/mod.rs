//! Segment Module
//!
//! Immutable, size-bounded segment files and their paired index files.
//!
//! ## Segment File
//! ```text
//! ┌──────────┬──────────┬─────┬──────────┐
//! │ value 1  │ value 2  │ ... │ value N  │   (key-sorted, no framing)
//! └──────────┴──────────┴─────┴──────────┘
//! ```
//! Values are located through the index; a segment never exceeds
//! `max_segment_size` unless a single value alone is larger.
//!
//! ## Index File
//! ```text
//! ┌───────────────┬─────────────────────────────────────────────────┐
//! │ CRC32 (4, LE) │ bincode([{key, offset, length, segment}, ...])  │
//! └───────────────┴─────────────────────────────────────────────────┘
//! ```
//!
//! ## Naming
//! `sstable_<generation:010>_<part:04>` pairs with `index_<generation:010>_<part:04>`.
//! A generation is allocated per flush or compaction run; parts number the
//! splits of one run in creation order.

mod catalog;
mod index;
mod reader;
mod writer;

pub use catalog::SegmentCatalog;
pub use index::{Index, IndexEntry};
pub use reader::{read_range, SegmentReader};
pub use writer::{SegmentMeta, SegmentWriter};

use std::fmt;
use std::fs::File;
use std::path::Path;

/// Filename prefix of segment files
pub const SEGMENT_PREFIX: &str = "sstable_";

/// Filename prefix of index files
pub const INDEX_PREFIX: &str = "index_";

/// Identifies one segment+index pair; ordered oldest → newest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId {
    /// Flush or compaction run that produced the pair
    pub generation: u64,
    /// Position of the pair within its run
    pub part: u32,
}

impl SegmentId {
    pub fn new(generation: u64, part: u32) -> Self {
        Self { generation, part }
    }

    /// Shared suffix of the segment and index filenames
    pub fn suffix(&self) -> String {
        format!("{:010}_{:04}", self.generation, self.part)
    }

    /// "sstable_0000000042_0001"
    pub fn segment_file_name(&self) -> String {
        format!("{}{}", SEGMENT_PREFIX, self.suffix())
    }

    /// "index_0000000042_0001"
    pub fn index_file_name(&self) -> String {
        format!("{}{}", INDEX_PREFIX, self.suffix())
    }

    /// Parse a segment filename
    /// "sstable_0000000042_0001" → Some(SegmentId { generation: 42, part: 1 })
    pub fn from_segment_file_name(name: &str) -> Option<Self> {
        Self::from_suffix(name.strip_prefix(SEGMENT_PREFIX)?)
    }

    /// Parse an index filename
    pub fn from_index_file_name(name: &str) -> Option<Self> {
        Self::from_suffix(name.strip_prefix(INDEX_PREFIX)?)
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        let (generation, part) = suffix.split_once('_')?;
        if !is_digits(generation) || !is_digits(part) {
            return None;
        }
        Some(Self {
            generation: generation.parse().ok()?,
            part: part.parse().ok()?,
        })
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Derive an index filename from its segment filename by swapping prefixes
pub fn index_name_for(segment_file_name: &str) -> Option<String> {
    let suffix = segment_file_name.strip_prefix(SEGMENT_PREFIX)?;
    Some(format!("{}{}", INDEX_PREFIX, suffix))
}

/// Make created/removed directory entries durable
pub(crate) fn sync_dir(dir: &Path) {
    // directories can't be opened for sync on every platform
    if let Ok(handle) = File::open(dir) {
        if let Err(e) = handle.sync_all() {
            tracing::debug!(dir = %dir.display(), error = %e, "directory sync skipped");
        }
    }
}
