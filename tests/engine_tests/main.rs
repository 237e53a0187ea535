//! Tests for Engine
//!
//! These tests verify:
//! - Basic put/get and the merge-read path
//! - Flush to segments
//! - Crash recovery from orphaned WALs
//! - Command execution
//! - Concurrent access patterns

mod recovery_tests;
