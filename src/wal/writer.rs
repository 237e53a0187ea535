//! WAL Writer
//!
//! Handles appending records to the active WAL file.

use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{KvError, Result};

use super::recovery::read_records;

/// Filename prefix shared by every WAL file
pub const WAL_PREFIX: &str = "write_ahead_log";

/// The append-only log of one MemTable generation
pub struct Wal {
    /// Location of the log file
    path: PathBuf,
    /// Open handle, positioned at the end of the last committed record
    file: File,
    /// When to fsync
    sync_strategy: WalSyncStrategy,
    /// Appends since the last fsync
    unsynced: usize,
    /// Bytes of fully committed records
    committed: u64,
}

impl Wal {
    /// Create a fresh, uniquely named WAL file inside `temp_dir`
    ///
    /// Failing here is fatal to engine startup: without a WAL nothing is durable.
    pub fn open(temp_dir: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        fs::create_dir_all(temp_dir)?;

        let (file, path) = tempfile::Builder::new()
            .prefix(WAL_PREFIX)
            .rand_bytes(10)
            .tempfile_in(temp_dir)
            .and_then(|tmp| tmp.keep().map_err(|e| e.error))
            .map_err(|e| {
                KvError::WalWrite(format!(
                    "could not create WAL file in {}: {}",
                    temp_dir.display(),
                    e
                ))
            })?;

        tracing::debug!(path = %path.display(), "WAL file created");

        Ok(Self {
            path,
            file,
            sync_strategy,
            unsynced: 0,
            committed: 0,
        })
    }

    /// Whether `name` follows the WAL naming pattern
    pub fn is_wal_file(name: &str) -> bool {
        name.starts_with(WAL_PREFIX)
    }

    /// Append `record` followed by a newline
    ///
    /// Returns the number of bytes written. On failure the file is cut back to
    /// the last committed record so a partial line never counts as written.
    pub fn append(&mut self, record: &str) -> Result<usize> {
        let mut line = Vec::with_capacity(record.len() + 1);
        line.extend_from_slice(record.as_bytes());
        line.push(b'\n');

        if let Err(e) = self.write_line(&line) {
            self.rollback();
            return Err(KvError::WalWrite(format!(
                "append to {} failed: {}",
                self.path.display(),
                e
            )));
        }

        self.committed += line.len() as u64;
        Ok(line.len())
    }

    fn write_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        self.file.write_all(line)?;
        self.file.flush()?;

        self.unsynced += 1;
        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if due {
            self.file.sync_data()?;
            self.unsynced = 0;
        }
        Ok(())
    }

    /// Drop whatever a failed append left past the committed length
    fn rollback(&mut self) {
        let restored = self
            .file
            .set_len(self.committed)
            .and_then(|_| self.file.seek(SeekFrom::Start(self.committed)).map(|_| ()));

        if let Err(e) = restored {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "could not roll back partial WAL append"
            );
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Read back every well-formed record, oldest first
    ///
    /// The file is synced first and left untouched; deleting it is up to the
    /// caller once the records live in sealed segments.
    pub fn seal(&mut self) -> Result<Vec<String>> {
        self.sync()?;
        let contents = read_records(&self.path)?;
        Ok(contents.records)
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes of committed records
    pub fn len(&self) -> u64 {
        self.committed
    }

    pub fn is_empty(&self) -> bool {
        self.committed == 0
    }

    /// Close the handle and delete the file
    pub fn remove(self) -> Result<()> {
        let Wal { path, file, .. } = self;
        drop(file);

        fs::remove_file(&path).map_err(|e| {
            KvError::Storage(format!(
                "could not delete WAL file {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %path.display(), "WAL file removed");
        Ok(())
    }
}
