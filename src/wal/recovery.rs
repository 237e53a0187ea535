//! WAL Recovery
//!
//! Handles crash recovery by replaying orphaned WAL files into the active
//! generation.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::entry::is_well_formed;
use crate::error::{KvError, Result};

use super::writer::Wal;

/// Well-formed records read from one WAL file
#[derive(Debug, Default)]
pub struct WalContents {
    /// Records in file order, without their trailing newline
    pub records: Vec<String>,

    /// Lines discarded as corrupt (including a torn tail)
    pub corrupt_lines: u64,
}

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of orphaned WAL files replayed
    pub files_replayed: u64,

    /// Number of records re-inserted into the active generation
    pub records_recovered: u64,

    /// Number of corrupt lines skipped
    pub records_corrupted: u64,

    /// Zero-byte files removed before replay
    pub empty_files_removed: u64,
}

/// Read `path` line by line and keep only well-formed records
pub fn read_records(path: &Path) -> Result<WalContents> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut contents = WalContents::default();

    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            break;
        }

        if buf.last() != Some(&b'\n') {
            tracing::warn!(
                path = %path.display(),
                bytes = n,
                "discarding unterminated WAL tail"
            );
            contents.corrupt_lines += 1;
            break;
        }

        match std::str::from_utf8(&buf) {
            Ok(line) if is_well_formed(line) => {
                contents.records.push(line[..line.len() - 1].to_string());
            }
            _ => {
                tracing::warn!(
                    path = %path.display(),
                    line = %String::from_utf8_lossy(&buf).trim_end(),
                    "discarding corrupt WAL line"
                );
                contents.corrupt_lines += 1;
            }
        }
    }

    Ok(contents)
}

/// Remove every zero-byte file directly inside `dir`
///
/// Such files are left by a crash before any byte was flushed. A directory
/// that doesn't exist yet has nothing to clean.
pub fn clean_empty_files(dir: &Path) -> Result<u64> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;

        if metadata.is_file() && metadata.len() == 0 {
            let path = entry.path();
            tracing::warn!(path = %path.display(), "removing empty file");

            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "could not remove empty file")
                }
            }
        }
    }

    Ok(removed)
}

/// Destination of replayed records
///
/// `replay` must re-append the record to the active WAL. `sync` makes those
/// appends durable and runs before each replayed orphan is deleted.
pub trait ReplaySink {
    fn replay(&mut self, record: &str) -> Result<()>;

    fn sync(&mut self) -> Result<()>;
}

/// Replays orphaned WAL files after a crash
pub struct WalRecovery {
    /// Directory holding WAL files
    temp_dir: PathBuf,

    /// The WAL of the generation being recovered into; never replayed
    active: PathBuf,
}

impl WalRecovery {
    pub fn new(temp_dir: &Path, active: &Path) -> Self {
        Self {
            temp_dir: temp_dir.to_path_buf(),
            active: active.to_path_buf(),
        }
    }

    /// WAL files in the temp directory other than the active one
    ///
    /// Ordered oldest first by modification time (then name) so that, across
    /// orphans, later writes win on replay.
    pub fn find_orphans(&self) -> Result<Vec<PathBuf>> {
        let mut orphans = Vec::new();

        for entry in fs::read_dir(&self.temp_dir)? {
            let entry = entry?;
            let path = entry.path();

            let is_wal = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(Wal::is_wal_file)
                .unwrap_or(false);

            if !is_wal || path == self.active || !entry.file_type()?.is_file() {
                continue;
            }

            let modified = entry.metadata()?.modified().ok();
            orphans.push((modified, path));
        }

        orphans.sort();
        Ok(orphans.into_iter().map(|(_, path)| path).collect())
    }

    /// Replay every orphan into `sink`, deleting each one once fully read
    ///
    /// The sink is synced before an orphan is deleted so a second crash
    /// cannot lose its records. A record the sink rejects as malformed is
    /// counted as corrupt; any other sink error aborts recovery and keeps the
    /// orphan. An orphan that cannot be opened is fatal.
    pub fn recover<S>(&self, sink: &mut S) -> Result<RecoveryResult>
    where
        S: ReplaySink + ?Sized,
    {
        let mut result = RecoveryResult::default();

        for orphan in self.find_orphans()? {
            tracing::info!(path = %orphan.display(), "replaying orphaned WAL file");

            let contents = read_records(&orphan).map_err(|e| {
                KvError::WalOpen(format!(
                    "{}: {}. Check the file or remove it if its data isn't needed",
                    orphan.display(),
                    e
                ))
            })?;
            result.records_corrupted += contents.corrupt_lines;

            for record in &contents.records {
                match sink.replay(record) {
                    Ok(()) => result.records_recovered += 1,
                    Err(KvError::MalformedRecord(reason)) => {
                        tracing::warn!(record = %record, %reason, "skipping unreplayable record");
                        result.records_corrupted += 1;
                    }
                    Err(e) => return Err(e),
                }
            }

            sink.sync()?;

            if let Err(e) = fs::remove_file(&orphan) {
                tracing::error!(
                    path = %orphan.display(),
                    error = %e,
                    "could not delete replayed WAL file"
                );
            }
            result.files_replayed += 1;
        }

        if result.files_replayed > 0 {
            tracing::info!(
                files = result.files_replayed,
                recovered = result.records_recovered,
                corrupted = result.records_corrupted,
                "WAL recovery finished"
            );
        }

        Ok(result)
    }
}
