//! Entry definitions
//!
//! The atomic data unit shared by the WAL, the MemTable and the segment writer,
//! plus the parser for the `"<key> <value>"` record format.

use bytes::Bytes;

use crate::error::{KvError, Result};

/// Separator between key and value inside a record
pub const RECORD_SEPARATOR: char = ' ';

/// Lines at or below this length (newline included) can't hold a record
pub const MIN_LINE_LEN: usize = 4;

/// A single key-value pair
///
/// Before a flush `value` holds the bytes and `offset` is zero. Once the entry
/// is placed in a segment, `value` is dropped and the data is addressed by
/// `segment` + `offset` + `length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: Option<Bytes>,
    /// Byte offset of the value within its segment file
    pub offset: u64,
    /// Byte length of the value
    pub length: u64,
    /// Segment file holding the value, once flushed
    pub segment: Option<String>,
}

impl Entry {
    /// Create an in-memory entry
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        let value = value.into();
        Self {
            key: key.into(),
            length: value.len() as u64,
            value: Some(value),
            offset: 0,
            segment: None,
        }
    }

    /// Parse a `"<key> <value>"` record into an entry
    pub fn from_record(record: &str) -> Result<Self> {
        let (key, value) = parse_record(record)?;
        Ok(Self::new(key, Bytes::copy_from_slice(value.as_bytes())))
    }

    /// Whether the entry has been placed in a segment file
    pub fn is_flushed(&self) -> bool {
        self.segment.is_some()
    }

    /// Record the on-disk location and release the in-memory value
    pub fn mark_flushed(&mut self, segment: &str, offset: u64) {
        self.offset = offset;
        self.segment = Some(segment.to_string());
        self.value = None;
    }
}

/// Check a raw WAL line (trailing newline included) for the record shape:
/// at least one separator and longer than `MIN_LINE_LEN` bytes.
pub fn is_well_formed(line: &str) -> bool {
    line.contains(RECORD_SEPARATOR) && line.len() > MIN_LINE_LEN
}

/// Split a record at its first separator
///
/// The record must not carry a newline, must be well-formed once a newline is
/// appended, and must have a non-empty key and value.
pub fn parse_record(record: &str) -> Result<(&str, &str)> {
    if record.contains('\n') {
        return Err(KvError::MalformedRecord(
            "record contains a newline".to_string(),
        ));
    }

    // the line form is record + '\n'
    if !record.contains(RECORD_SEPARATOR) || record.len() + 1 <= MIN_LINE_LEN {
        return Err(KvError::MalformedRecord(format!(
            "expected '<key> <value>', got {:?}",
            record
        )));
    }

    match record.split_once(RECORD_SEPARATOR) {
        Some((key, value)) if !key.is_empty() && !value.is_empty() => Ok((key, value)),
        _ => Err(KvError::MalformedRecord(format!(
            "empty key or value in record {:?}",
            record
        ))),
    }
}

/// Build the record text for a key-value pair
///
/// Keys may not contain the separator or a newline; values may not contain a
/// newline. Both must be non-empty.
pub fn format_record(key: &str, value: &str) -> Result<String> {
    if key.is_empty() || value.is_empty() {
        return Err(KvError::InvalidInput(
            "key and value must both be non-empty".to_string(),
        ));
    }
    if key.contains(RECORD_SEPARATOR) || key.contains('\n') {
        return Err(KvError::InvalidInput(format!(
            "key {:?} may not contain spaces or newlines",
            key
        )));
    }
    if value.contains('\n') {
        return Err(KvError::InvalidInput(
            "value may not contain newlines".to_string(),
        ));
    }
    Ok(format!("{}{}{}", key, RECORD_SEPARATOR, value))
}
