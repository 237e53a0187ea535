//! Segment Writer
//!
//! Drains key-sorted entries into one or more size-bounded segment+index pairs.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::entry::Entry;
use crate::error::{KvError, Result};

use super::{sync_dir, Index, IndexEntry, SegmentId};

/// A sealed segment+index pair produced by the writer
#[derive(Debug, Clone)]
pub struct SegmentMeta {
    pub id: SegmentId,
    pub segment_path: PathBuf,
    pub index_path: PathBuf,
    /// Segment file size in bytes
    pub size: u64,
    /// The index as written to disk
    pub index: Index,
}

impl SegmentMeta {
    pub fn entry_count(&self) -> usize {
        self.index.len()
    }
}

/// Writes segment files into one storage directory
#[derive(Debug, Clone)]
pub struct SegmentWriter {
    storage_dir: PathBuf,
    max_segment_size: u64,
}

impl SegmentWriter {
    pub fn new(storage_dir: &Path, max_segment_size: u64) -> Self {
        Self {
            storage_dir: storage_dir.to_path_buf(),
            max_segment_size,
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn max_segment_size(&self) -> u64 {
        self.max_segment_size
    }

    /// Write `entries` (sorted ascending by key, values in memory) as
    /// generation `generation`
    ///
    /// Each call to the single-segment writer consumes a prefix of the
    /// remaining entries; the loop runs until nothing is left. If a pair fails,
    /// its partial files are removed and the error is returned; pairs sealed
    /// earlier in the same call stay on disk.
    pub fn write_segments(&self, entries: &[Entry], generation: u64) -> Result<Vec<SegmentMeta>> {
        let mut sealed = Vec::new();
        let mut remaining = entries;
        let mut part = 0u32;

        while !remaining.is_empty() {
            let id = SegmentId::new(generation, part);
            let (meta, consumed) = self.write_segment(remaining, id)?;

            tracing::debug!(
                segment = %meta.segment_path.display(),
                entries = consumed,
                bytes = meta.size,
                "segment sealed"
            );

            sealed.push(meta);
            remaining = &remaining[consumed..];
            part += 1;
        }

        if !sealed.is_empty() {
            sync_dir(&self.storage_dir);
        }

        Ok(sealed)
    }

    /// Write as many leading entries as fit into one segment
    ///
    /// The bound is checked before each value is appended: an entry that would
    /// push a non-empty segment past `max_segment_size` starts the next one,
    /// and an oversized entry gets a segment of its own.
    fn write_segment(&self, entries: &[Entry], id: SegmentId) -> Result<(SegmentMeta, usize)> {
        let segment_name = id.segment_file_name();
        let segment_path = self.storage_dir.join(&segment_name);
        let index_path = self.storage_dir.join(id.index_file_name());

        // Only files this call created are removed on failure
        let mut created = Vec::with_capacity(2);

        match self.write_pair(entries, &segment_name, &segment_path, &index_path, &mut created) {
            Ok((index, size)) => {
                let consumed = index.len();
                let meta = SegmentMeta {
                    id,
                    segment_path,
                    index_path,
                    size,
                    index,
                };
                Ok((meta, consumed))
            }
            Err(e) => {
                for path in &created {
                    remove_partial(path);
                }
                Err(KvError::Storage(format!(
                    "writing segment {} failed: {}",
                    segment_name, e
                )))
            }
        }
    }

    /// Create and fill the segment, then its index, recording each file in
    /// `created` as soon as it exists
    fn write_pair(
        &self,
        entries: &[Entry],
        segment_name: &str,
        segment_path: &Path,
        index_path: &Path,
        created: &mut Vec<PathBuf>,
    ) -> Result<(Index, u64)> {
        let file = create_file(segment_path)?;
        created.push(segment_path.to_path_buf());
        let (index, size) = self.write_data(file, entries, segment_name)?;

        let mut index_file = create_file(index_path)?;
        created.push(index_path.to_path_buf());
        index.write_file(&mut index_file)?;

        Ok((index, size))
    }

    fn write_data(&self, file: File, entries: &[Entry], segment_name: &str) -> Result<(Index, u64)> {
        let mut writer = BufWriter::new(file);

        let mut index = Index::new();
        let mut written: u64 = 0;

        for entry in entries {
            let value = entry.value.as_ref().ok_or_else(|| {
                KvError::Storage(format!("entry {:?} has no value in memory", entry.key))
            })?;
            let length = value.len() as u64;

            if !index.is_empty() && written + length > self.max_segment_size {
                break;
            }

            index.push(IndexEntry {
                key: entry.key.clone(),
                offset: written,
                length,
                segment: segment_name.to_string(),
            });
            writer.write_all(value)?;
            written += length;
        }

        let file: File = writer
            .into_inner()
            .map_err(|e| KvError::Storage(format!("failed to flush segment: {}", e)))?;
        file.sync_all()?;

        Ok((index, written))
    }
}

/// Create `path`, failing if anything already sits there
fn create_file(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create_new(true).write(true).open(path)?)
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::error!(path = %path.display(), error = %e, "could not remove partial file"),
    }
}
