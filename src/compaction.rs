//! Compaction Module
//!
//! Merges undersized segments into fewer, larger ones.
//!
//! ## Policy
//! 1. Candidates are segment files with `0 < size < threshold`
//! 2. Fewer than two candidates, or candidates that would not fit in fewer
//!    segments once merged: nothing to merge
//! 3. Candidates are read oldest → newest; for a key present in several, the
//!    newest segment wins
//! 4. Keys also present in a newer non-candidate segment are dropped, since
//!    the merged output becomes the newest generation
//! 5. The merged run goes through the segment writer with the usual size bound
//! 6. Inputs are deleted only after every output pair is synced

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};

use crate::engine::Engine;
use crate::entry::Entry;
use crate::error::{KvError, Result};
use crate::segment::{Index, SegmentId, SegmentMeta, SegmentReader, SegmentWriter};

/// What a compaction run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// Fewer than two undersized segments; nothing was touched
    NoCandidates,

    /// Inputs were merged into outputs
    Compacted {
        inputs: Vec<SegmentId>,
        outputs: Vec<SegmentId>,
        /// Entries written to the outputs
        entries: usize,
        /// Candidate entries dropped as stale
        dropped: usize,
    },
}

/// The segments one compaction run will merge
#[derive(Debug, Clone)]
pub struct CompactionPlan {
    /// Inputs, oldest first
    pub candidates: Vec<SegmentId>,
    /// Combined size of the inputs in bytes
    pub total_bytes: u64,
}

impl CompactionPlan {
    /// Whether merging would leave the segment count unchanged
    pub fn is_empty(&self, max_segment_size: u64) -> bool {
        let n = self.candidates.len() as u64;
        n < 2 || self.total_bytes > max_segment_size.saturating_mul(n - 1)
    }
}

/// Merges small segments of one storage directory
#[derive(Debug, Clone)]
pub struct Compactor {
    storage_dir: PathBuf,
    threshold: u64,
    writer: SegmentWriter,
}

impl Compactor {
    pub fn new(storage_dir: &Path, threshold: u64, max_segment_size: u64) -> Self {
        Self {
            storage_dir: storage_dir.to_path_buf(),
            threshold,
            writer: SegmentWriter::new(storage_dir, max_segment_size),
        }
    }

    /// Segment files in the storage directory, oldest first, with their sizes
    fn list_segments(&self) -> Result<Vec<(SegmentId, u64)>> {
        let mut segments = Vec::new();

        for entry in fs::read_dir(&self.storage_dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }

            let id = entry
                .file_name()
                .to_str()
                .and_then(SegmentId::from_segment_file_name);
            if let Some(id) = id {
                segments.push((id, metadata.len()));
            }
        }

        segments.sort();
        Ok(segments)
    }

    /// Pick the undersized segments
    pub fn plan(&self) -> Result<CompactionPlan> {
        let small: Vec<(SegmentId, u64)> = self
            .list_segments()?
            .into_iter()
            .filter(|&(_, size)| size > 0 && size < self.threshold)
            .collect();

        Ok(CompactionPlan {
            total_bytes: small.iter().map(|(_, size)| size).sum(),
            candidates: small.into_iter().map(|(id, _)| id).collect(),
        })
    }

    /// Whether `plan` is worth running
    pub fn worth_merging(&self, plan: &CompactionPlan) -> bool {
        !plan.is_empty(self.writer.max_segment_size())
    }

    /// Write the merged outputs of `plan` as generation `generation`
    ///
    /// Inputs are left in place; see `remove_inputs`.
    pub fn merge(&self, plan: &CompactionPlan, generation: u64) -> Result<(Vec<SegmentMeta>, usize)> {
        let oldest = match plan.candidates.first() {
            Some(id) => *id,
            None => return Ok((Vec::new(), 0)),
        };

        // key → (segment it came from, entry); later candidates overwrite
        let mut merged: BTreeMap<String, (SegmentId, Entry)> = BTreeMap::new();
        let mut read = 0usize;
        for id in &plan.candidates {
            let reader = SegmentReader::open(&self.segment_path(id))?;
            for entry in reader.read_all()? {
                read += 1;
                merged.insert(entry.key.clone(), (*id, entry));
            }
        }

        // Newer segments left out of the merge shadow older candidate values
        let mut dropped = 0usize;
        for (id, _) in self.list_segments()? {
            if id <= oldest || plan.candidates.contains(&id) {
                continue;
            }
            let index = Index::read_from(&self.storage_dir.join(id.index_file_name()))?;

            for key in index.keys() {
                let shadowed = matches!(merged.get(key), Some((source, _)) if *source < id);
                if shadowed {
                    merged.remove(key);
                    dropped += 1;
                }
            }
        }

        let entries: Vec<Entry> = merged.into_values().map(|(_, entry)| entry).collect();
        let metas = self.writer.write_segments(&entries, generation)?;

        tracing::debug!(
            inputs = plan.candidates.len(),
            read,
            written = entries.len(),
            dropped,
            outputs = metas.len(),
            "segments merged"
        );

        Ok((metas, dropped))
    }

    /// Delete the input pairs of a finished merge
    ///
    /// Failures are logged; the merged copy already exists.
    pub fn remove_inputs(&self, plan: &CompactionPlan) {
        for id in &plan.candidates {
            for path in [self.segment_path(id), self.storage_dir.join(id.index_file_name())] {
                if let Err(e) = fs::remove_file(&path) {
                    tracing::error!(path = %path.display(), error = %e, "could not delete compacted file");
                }
            }
        }
    }

    /// Plan, merge and clean up in one go
    ///
    /// The caller must keep flushes out of the directory for the duration.
    pub fn compact(&self, generation: u64) -> Result<CompactionOutcome> {
        let plan = self.plan()?;
        if !self.worth_merging(&plan) {
            tracing::debug!(dir = %self.storage_dir.display(), "no compaction candidates");
            return Ok(CompactionOutcome::NoCandidates);
        }

        let (metas, dropped) = self.merge(&plan, generation)?;
        self.remove_inputs(&plan);

        Ok(outcome(&plan, &metas, dropped))
    }

    fn segment_path(&self, id: &SegmentId) -> PathBuf {
        self.storage_dir.join(id.segment_file_name())
    }
}

pub(crate) fn outcome(plan: &CompactionPlan, metas: &[SegmentMeta], dropped: usize) -> CompactionOutcome {
    CompactionOutcome::Compacted {
        inputs: plan.candidates.clone(),
        outputs: metas.iter().map(|m| m.id).collect(),
        entries: metas.iter().map(|m| m.entry_count()).sum(),
        dropped,
    }
}

/// Compact `storage_dir` on its own, outside an engine
///
/// Allocates the output generation as one past the newest file present.
/// Follows the same policy as `Engine::compact`: a candidate set that would
/// not fit in fewer segments once merged is skipped with
/// `CompactionOutcome::NoCandidates`.
pub fn compact(storage_dir: &Path, threshold: u64, max_segment_size: u64) -> Result<CompactionOutcome> {
    if threshold == 0 {
        return Err(KvError::Config("compaction threshold must be > 0".to_string()));
    }

    let compactor = Compactor::new(storage_dir, threshold, max_segment_size);
    let generation = compactor
        .list_segments()?
        .last()
        .map(|(id, _)| id.generation + 1)
        .unwrap_or(1);

    compactor.compact(generation)
}

// =============================================================================
// Background worker
// =============================================================================

/// Runs `Engine::compact` on a fixed period until dropped
pub struct CompactionWorker {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CompactionWorker {
    /// Start the worker; it holds only a weak reference to the engine
    pub fn spawn(engine: &Arc<Engine>, interval: Duration) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
        let weak: Weak<Engine> = Arc::downgrade(engine);

        let handle = thread::Builder::new()
            .name("segmentkv-compactor".to_string())
            .spawn(move || {
                let ticker = channel::tick(interval);
                loop {
                    crossbeam::select! {
                        recv(ticker) -> _ => {
                            let Some(engine) = weak.upgrade() else { break };
                            match engine.compact() {
                                Ok(CompactionOutcome::NoCandidates) => {}
                                Ok(outcome) => tracing::info!(?outcome, "background compaction finished"),
                                Err(e) => tracing::error!(error = %e, "background compaction failed"),
                            }
                        }
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                tracing::debug!("compaction worker stopped");
            })?;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Stop the worker and wait for it
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("compaction worker panicked");
            }
        }
    }
}

impl Drop for CompactionWorker {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}
