//! Tests for the wire protocol and TCP server
//!
//! These tests verify:
//! - Frame layout of commands and responses
//! - Rejection of malformed frames
//! - End-to-end requests against a running server

mod server_tests;
