//! Segment Reader
//!
//! Opens a sealed segment through its index and reads value byte ranges.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::entry::Entry;
use crate::error::{KvError, Result};

use super::{Index, IndexEntry, SegmentId};

/// Read access to one segment+index pair
///
/// The index is held in memory; the segment file is opened per read so
/// lookups only need `&self`.
#[derive(Debug, Clone)]
pub struct SegmentReader {
    id: SegmentId,
    segment_path: PathBuf,
    index_path: PathBuf,
    index: Index,
    /// Segment file size in bytes
    size: u64,
}

impl SegmentReader {
    /// Open the segment at `segment_path`, loading its paired index
    pub fn open(segment_path: &Path) -> Result<Self> {
        let name = segment_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                KvError::Storage(format!("invalid segment path {}", segment_path.display()))
            })?;
        let id = SegmentId::from_segment_file_name(name).ok_or_else(|| {
            KvError::Storage(format!("not a segment file name: {}", name))
        })?;

        let index_path = segment_path.with_file_name(id.index_file_name());
        let index = Index::read_from(&index_path)?;
        let size = std::fs::metadata(segment_path)?.len();

        if index.data_len() != size {
            return Err(KvError::IndexCorruption(format!(
                "{} addresses {} bytes but segment holds {}",
                index_path.display(),
                index.data_len(),
                size
            )));
        }

        Ok(Self {
            id,
            segment_path: segment_path.to_path_buf(),
            index_path,
            index,
            size,
        })
    }

    /// Wrap a pair whose index is already in memory (just written)
    pub fn from_parts(id: SegmentId, segment_path: PathBuf, index_path: PathBuf, index: Index, size: u64) -> Self {
        Self {
            id,
            segment_path,
            index_path,
            index,
            size,
        }
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn segment_path(&self) -> &Path {
        &self.segment_path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Look up a key's location
    pub fn find(&self, key: &str) -> Option<&IndexEntry> {
        self.index.find(key)
    }

    /// Read the value for `key`, if this segment holds it
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.index.find(key) {
            Some(entry) => read_range(&self.segment_path, entry.offset, entry.length).map(Some),
            None => Ok(None),
        }
    }

    /// Read every entry back, values included, in key order
    pub fn read_all(&self) -> Result<Vec<Entry>> {
        let mut file = File::open(&self.segment_path)?;
        let mut data = Vec::with_capacity(self.size as usize);
        file.read_to_end(&mut data)?;

        self.index
            .entries
            .iter()
            .map(|e| {
                let start = e.offset as usize;
                let end = start + e.length as usize;
                let value = data.get(start..end).ok_or_else(|| {
                    KvError::IndexCorruption(format!(
                        "{:?} points past the end of {}",
                        e.key,
                        self.segment_path.display()
                    ))
                })?;
                Ok(Entry::new(e.key.clone(), Bytes::copy_from_slice(value)))
            })
            .collect()
    }
}

/// Read `length` bytes at `offset` from the file at `path`
pub fn read_range(path: &Path, offset: u64, length: u64) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;

    let mut value = vec![0u8; length as usize];
    file.read_exact(&mut value)?;
    Ok(value)
}
