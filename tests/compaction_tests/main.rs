//! Tests for compaction
//!
//! These tests verify:
//! - Candidate selection and the worth-merging check
//! - Newest value wins across merged segments
//! - Values shadowed by newer segments are not resurrected
//! - The background worker

mod worker_tests;
