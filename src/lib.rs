//! # SegmentKV
//!
//! A small log-structured key-value store:
//! - Every write is appended to a write-ahead log before it is acknowledged
//! - Writes buffer in a MemTable until flushed to sorted, size-bounded segments
//! - Each segment has an index of key → (offset, length)
//! - Orphaned logs from a crash are replayed on the next start
//! - Undersized segments are merged by compaction
//!
//! ## Architecture Overview
//!
//! ```text
//!            insert("key value")                     get(key)
//!                    │                                  │
//! ┌──────────────────▼──────────────────────────────────▼───────┐
//! │                          Engine                              │
//! └──────┬───────────────────────┬──────────────────────┬───────┘
//!        │ append                │ add                  │ miss
//!        ▼                       ▼                      ▼
//!  ┌───────────┐          ┌─────────────┐       ┌───────────────┐
//!  │    WAL    │          │  MemTable   │       │ SegmentCatalog │
//!  │ (temp dir)│          │  (RwLock)   │       │ newest→oldest  │
//!  └───────────┘          └──────┬──────┘       └───────▲───────┘
//!   deleted after                │ persist              │ register
//!   a flush                      ▼                      │
//!                         ┌─────────────┐               │
//!                         │SegmentWriter├───────────────┘
//!                         │ sstable_* + │
//!                         │  index_*    │◄──── Compactor (merge small)
//!                         └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod entry;
pub mod wal;
pub mod memtable;
pub mod segment;
pub mod compaction;
pub mod engine;

pub mod protocol;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::Config;
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SegmentKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
