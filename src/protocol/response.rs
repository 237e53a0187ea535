//! Server responses

use crate::error::{KvError, Result};

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
}

impl TryFrom<u8> for Status {
    type Error = KvError;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(Status::Ok),
            0x01 => Ok(Status::NotFound),
            0x02 => Ok(Status::Error),
            other => Err(KvError::Protocol(format!("unknown response status 0x{:02x}", other))),
        }
    }
}

/// A response frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,

    /// Value for GET, summary for FLUSH/COMPACT, message for ERROR
    pub payload: Option<Vec<u8>>,
}

impl Response {
    pub fn ok(payload: Option<Vec<u8>>) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            payload: None,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            status: Status::Error,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Map an engine result onto the wire
    pub fn from_result(result: Result<Option<Vec<u8>>>) -> Self {
        match result {
            Ok(payload) => Response::ok(payload),
            Err(KvError::KeyNotFound) => Response::not_found(),
            Err(e) => Response::error(&e.to_string()),
        }
    }

    /// Payload as text, lossily
    pub fn payload_text(&self) -> String {
        self.payload
            .as_deref()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .unwrap_or_default()
    }
}
