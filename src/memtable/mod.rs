//! MemTable Module
//!
//! In-memory buffer of the current generation's writes, mirrored to its WAL.
//!
//! ## Responsibilities
//! - Append every record to the WAL before it becomes visible
//! - Key lookups within the current generation only
//! - Last write wins for a key reassigned in the same generation
//! - Drain sorted entries into segments on `persist`
//!
//! ## Ordering Policy
//! Entries are kept in insertion order and sorted once, lazily, right before a
//! flush (O(n log n) once instead of per insert). `get` goes through the key
//! index and never relies on order. After sorting, the key index is rebuilt
//! from scratch so it never points at a stale slot.

mod table;

pub use table::MemTable;
