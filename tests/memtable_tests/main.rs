//! Tests for entries and the MemTable
//!
//! These tests verify:
//! - Record parsing and formatting rules
//! - WAL-before-memory insert ordering
//! - Last write wins within a generation
//! - Sort order and segment placement after persist

mod table_tests;
