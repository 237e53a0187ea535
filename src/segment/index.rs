//! Segment Index
//!
//! Ordered key → (offset, length, segment) mapping persisted next to each
//! segment file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KvError, Result};

/// Checksum prefix length
const CRC_SIZE: usize = 4;

/// Location of one value inside a segment file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: String,
    pub offset: u64,
    pub length: u64,
    /// Filename (not path) of the segment holding the value
    pub segment: String,
}

/// The ordered entries of one segment, sorted ascending by key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    pub entries: Vec<IndexEntry>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: IndexEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in index order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    /// Binary search for `key`
    pub fn find(&self, key: &str) -> Option<&IndexEntry> {
        self.entries
            .binary_search_by(|e| e.key.as_str().cmp(key))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Total bytes addressed by this index
    pub fn data_len(&self) -> u64 {
        self.entries.iter().map(|e| e.length).sum()
    }

    /// Serialize: CRC32 of the payload, then the bincode payload
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(&self.entries)?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        let crc = hasher.finalize();

        let mut bytes = Vec::with_capacity(CRC_SIZE + payload.len());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Deserialize and verify the checksum
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CRC_SIZE {
            return Err(KvError::IndexCorruption(format!(
                "index too short: {} bytes",
                bytes.len()
            )));
        }

        let (crc_bytes, payload) = bytes.split_at(CRC_SIZE);
        let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let actual = crc32fast::hash(payload);

        if expected != actual {
            return Err(KvError::IndexCorruption(format!(
                "checksum mismatch: stored {:08x}, computed {:08x}",
                expected, actual
            )));
        }

        let entries: Vec<IndexEntry> = bincode::deserialize(payload)
            .map_err(|e| KvError::IndexCorruption(format!("undecodable payload: {}", e)))?;

        Ok(Self { entries })
    }

    /// Write to a new file at `path` and sync it
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(path)?;
        self.write_file(&mut file)
    }

    /// Write into an already created, empty `file` and sync it
    pub fn write_file(&self, file: &mut File) -> Result<()> {
        let bytes = self.encode()?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        Ok(())
    }

    /// Load from the file at `path`
    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::decode(&bytes).map_err(|e| match e {
            KvError::IndexCorruption(reason) => {
                KvError::IndexCorruption(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })
    }
}
