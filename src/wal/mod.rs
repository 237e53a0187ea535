//! Write-Ahead Log (WAL) Module
//!
//! Provides durability for writes that have not yet reached a segment file.
//!
//! ## Responsibilities
//! - Append one line per record before the MemTable makes it visible
//! - Hand back the well-formed records of a generation (`seal`)
//! - Replay orphaned WAL files left behind by a crash
//! - Sweep zero-byte garbage from storage/temp directories
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────┐
//! │ <key> <value>\n              │
//! │ <key> <value>\n              │
//! │ ...                          │
//! └──────────────────────────────┘
//! ```
//! The first space separates key from value. Lines without a space or not
//! longer than 4 bytes (newline included) are treated as corrupt, as is an
//! unterminated tail left by a torn write.
//!
//! ## Naming
//! `{temp_dir}/write_ahead_log<random suffix>`; one active file per
//! generation, any others found at startup are orphans.

mod writer;
mod recovery;

pub use writer::{Wal, WAL_PREFIX};
pub use recovery::{
    clean_empty_files, read_records, RecoveryResult, ReplaySink, WalContents, WalRecovery,
};
